//! Declarative request validation.
//!
//! Each endpoint declares an ordered list of [`FieldRules`]. Rules for one
//! field run in order and stop at the first failure; failures from all
//! fields are collected, in declaration order, into one list.

use crate::db::{ReadingStatus, UserStore};
use crate::error::StoreError;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Where a field was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// JSON request body.
    Body,
    /// Query string.
    Query,
}

/// One failed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Always `"field"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Value at the point it failed; absent when the field was missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Failure message.
    pub msg: String,
    /// Field name.
    pub path: String,
    /// Where the field was read from.
    pub location: Location,
}

/// A single check or sanitizer.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Strip surrounding whitespace from strings.
    Trim,
    /// Reject missing, null and empty values.
    Required(&'static str),
    /// Reject anything but a string.
    String(&'static str),
    /// Replace HTML special characters with entities.
    Escape,
    /// Integer (number or numeric string) of at least `min`; normalized to a number.
    Int {
        /// Smallest accepted value.
        min: i64,
        /// Failure message.
        msg: &'static str,
    },
    /// String from a fixed set.
    OneOf(&'static [&'static str], &'static str),
    /// String length in characters.
    Length {
        /// Minimum length.
        min: usize,
        /// Maximum length, if bounded.
        max: Option<usize>,
        /// Failure message.
        msg: &'static str,
    },
    /// No user with this username exists. Looks up the store.
    UsernameAvailable(&'static str),
}

/// Rules for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRules {
    /// Field name.
    pub field: &'static str,
    /// Skip all rules when the field is absent.
    pub optional: bool,
    /// Rules, in order.
    pub rules: &'static [Rule],
}

impl FieldRules {
    /// Rules that always run.
    pub const fn required(field: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            field,
            optional: false,
            rules,
        }
    }

    /// Rules that only run when the field is present.
    pub const fn optional(field: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            field,
            optional: true,
            rules,
        }
    }
}

const POSITIVE_GENRE: Rule = Rule::Int {
    min: 1,
    msg: "Genre ID must be a positive integer",
};
const STATUS: Rule = Rule::OneOf(
    &ReadingStatus::VALUES,
    "Status must be one of: to_read, in_progress, read",
);
const TITLE: &[Rule] = &[
    Rule::Trim,
    Rule::Required("Title is required"),
    Rule::String("Title must be a string"),
    Rule::Escape,
];
const AUTHOR: &[Rule] = &[
    Rule::Trim,
    Rule::Required("Author is required"),
    Rule::String("Author must be a string"),
    Rule::Escape,
];
const COVER_IMAGE: &[Rule] = &[Rule::String("Cover image must be a string"), Rule::Trim];

/// `GET /books` query.
pub const BOOK_QUERY: &[FieldRules] = &[
    FieldRules::optional(
        "title",
        &[Rule::String("Title must be a string"), Rule::Trim, Rule::Escape],
    ),
    FieldRules::optional("genreId", &[POSITIVE_GENRE]),
    FieldRules::optional(
        "userId",
        &[Rule::Int {
            min: 1,
            msg: "User ID must be a positive integer",
        }],
    ),
];

/// `POST /books` body.
pub const BOOK_CREATE: &[FieldRules] = &[
    FieldRules::required("title", TITLE),
    FieldRules::required("author", AUTHOR),
    FieldRules::required(
        "genreId",
        &[Rule::Required("Genre ID is required"), POSITIVE_GENRE],
    ),
    FieldRules::optional("status", &[STATUS]),
    FieldRules::optional("coverImage", COVER_IMAGE),
];

/// `PATCH /books/{id}` body.
pub const BOOK_UPDATE: &[FieldRules] = &[
    FieldRules::optional("title", TITLE),
    FieldRules::optional("author", AUTHOR),
    FieldRules::optional(
        "genreId",
        &[Rule::Required("Genre ID is required"), POSITIVE_GENRE],
    ),
    FieldRules::optional("status", &[STATUS]),
    FieldRules::optional("coverImage", COVER_IMAGE),
];

/// Genre create and update body.
pub const GENRE: &[FieldRules] = &[FieldRules::required(
    "name",
    &[
        Rule::Trim,
        Rule::Required("Name is required"),
        Rule::String("Name must be a string"),
        Rule::Escape,
    ],
)];

/// `POST /login` body.
pub const LOGIN: &[FieldRules] = &[
    FieldRules::required(
        "username",
        &[
            Rule::Trim,
            Rule::Required("Username is required"),
            Rule::String("Username must be a string"),
            Rule::Escape,
        ],
    ),
    FieldRules::required(
        "password",
        &[
            Rule::Required("Password is required"),
            Rule::String("Password must be a string"),
        ],
    ),
];

/// `POST /register` body.
pub const REGISTER: &[FieldRules] = &[
    FieldRules::required(
        "username",
        &[
            Rule::Trim,
            Rule::Required("Username is required"),
            Rule::String("Username must be a string"),
            Rule::Length {
                min: 3,
                max: Some(20),
                msg: "Username must be between 3 and 20 characters",
            },
            Rule::Escape,
            Rule::UsernameAvailable("Username already exists"),
        ],
    ),
    FieldRules::required("password", NEW_PASSWORD),
];

const NEW_PASSWORD: &[Rule] = &[
    Rule::Required("Password is required"),
    Rule::String("Password must be a string"),
    Rule::Length {
        min: 6,
        max: None,
        msg: "Password must be at least 6 characters long",
    },
];

/// Password change.
pub const PASSWORD_CHANGE: &[FieldRules] = &[FieldRules::required("password", NEW_PASSWORD)];

/// Why validation did not produce values.
#[derive(Error, Debug)]
pub enum Rejection {
    /// One or more fields failed.
    #[error("{}", join_messages(.0))]
    Invalid(Vec<FieldError>),
    /// A store lookup inside a rule failed.
    #[error(transparent)]
    Store(StoreError),
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.msg))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Sanitized values of the fields that passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    values: Map<String, Value>,
}

impl Validated {
    /// Raw sanitized value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Sanitized string value.
    pub fn string(&self, field: &str) -> Option<String> {
        self.values
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Sanitized integer value.
    pub fn int(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(Value::as_i64)
    }

    /// Sanitized reading status.
    pub fn status(&self, field: &str) -> Option<ReadingStatus> {
        self.values
            .get(field)
            .and_then(Value::as_str)
            .and_then(ReadingStatus::parse)
    }
}

/// Run `rules` against `input`.
pub fn validate(
    rules: &[FieldRules],
    location: Location,
    input: &Map<String, Value>,
    users: &dyn UserStore,
) -> Result<Validated, Rejection> {
    let mut errors = Vec::new();
    let mut values = Map::new();

    for field_rules in rules {
        let original = input.get(field_rules.field);
        if field_rules.optional && original.is_none() {
            continue;
        }

        let mut current = original.cloned();
        let mut failure = None;

        for rule in field_rules.rules {
            match apply(rule, &mut current, users) {
                Ok(()) => {}
                Err(Outcome::Failed(msg)) => {
                    failure = Some(msg);
                    break;
                }
                Err(Outcome::Store(err)) => return Err(Rejection::Store(err)),
            }
        }

        match (failure, current) {
            (Some(msg), value) => errors.push(FieldError {
                kind: "field",
                value,
                msg: msg.to_string(),
                path: field_rules.field.to_string(),
                location,
            }),
            (None, Some(value)) => {
                values.insert(field_rules.field.to_string(), value);
            }
            (None, None) => {}
        }
    }

    if errors.is_empty() {
        Ok(Validated { values })
    } else {
        Err(Rejection::Invalid(errors))
    }
}

/// Check a new account the way `POST /register` does, returning the
/// sanitized username and the password.
pub fn registration(
    username: &str,
    password: &str,
    users: &dyn UserStore,
) -> Result<(String, String), Rejection> {
    let mut input = Map::new();
    input.insert("username".to_string(), Value::from(username));
    input.insert("password".to_string(), Value::from(password));

    let values = validate(REGISTER, Location::Body, &input, users)?;
    Ok((
        values.string("username").unwrap_or_default(),
        values.string("password").unwrap_or_default(),
    ))
}

/// Check a replacement password against the registration minimum.
pub fn new_password(password: &str, users: &dyn UserStore) -> Result<String, Rejection> {
    let mut input = Map::new();
    input.insert("password".to_string(), Value::from(password));

    let values = validate(PASSWORD_CHANGE, Location::Body, &input, users)?;
    Ok(values.string("password").unwrap_or_default())
}

/// Username as stored, for lookups by a typed-in name.
pub fn stored_username(raw: &str) -> String {
    escape_html(raw.trim())
}

enum Outcome {
    Failed(&'static str),
    Store(StoreError),
}

fn apply(rule: &Rule, value: &mut Option<Value>, users: &dyn UserStore) -> Result<(), Outcome> {
    match *rule {
        Rule::Trim => {
            if let Some(Value::String(s)) = value {
                let trimmed = s.trim().to_string();
                *s = trimmed;
            }
            Ok(())
        }
        Rule::Required(msg) => match value {
            None | Some(Value::Null) => Err(Outcome::Failed(msg)),
            Some(Value::String(s)) if s.is_empty() => Err(Outcome::Failed(msg)),
            _ => Ok(()),
        },
        Rule::String(msg) => match value {
            Some(Value::String(_)) => Ok(()),
            _ => Err(Outcome::Failed(msg)),
        },
        Rule::Escape => {
            if let Some(Value::String(s)) = value {
                *s = escape_html(s);
            }
            Ok(())
        }
        Rule::Int { min, msg } => {
            let parsed = match value {
                Some(Value::Number(n)) => n.as_i64(),
                Some(Value::String(s)) => s.parse::<i64>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) if n >= min => {
                    *value = Some(Value::from(n));
                    Ok(())
                }
                _ => Err(Outcome::Failed(msg)),
            }
        }
        Rule::OneOf(allowed, msg) => match value {
            Some(Value::String(s)) if allowed.contains(&s.as_str()) => Ok(()),
            _ => Err(Outcome::Failed(msg)),
        },
        Rule::Length { min, max, msg } => match value {
            Some(Value::String(s)) => {
                let len = s.chars().count();
                if len >= min && max.is_none_or(|max| len <= max) {
                    Ok(())
                } else {
                    Err(Outcome::Failed(msg))
                }
            }
            _ => Err(Outcome::Failed(msg)),
        },
        Rule::UsernameAvailable(msg) => {
            let Some(Value::String(username)) = value else {
                return Err(Outcome::Failed(msg));
            };
            match users.get_user_by_username(username) {
                Ok(Some(_)) => Err(Outcome::Failed(msg)),
                Ok(None) => Ok(()),
                Err(err) => Err(Outcome::Store(err)),
            }
        }
    }
}

/// Escape `& < > " ' / \ `` for safe embedding in HTML.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}
