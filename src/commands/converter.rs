//! String-to-value converters for command arguments.
//!
//! Every converter is strict: the whole token must parse, with no trimming
//! and no partial matches.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use guildline_proto::HashId;
use uuid::Uuid;

/// Declared type of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgType {
    String,
    Char,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    DateTime,
    Duration,
    Uuid,
    HashId,
}

impl ArgType {
    pub const ALL: [ArgType; 17] = [
        Self::String,
        Self::Char,
        Self::Bool,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::DateTime,
        Self::Duration,
        Self::Uuid,
        Self::HashId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Char => "char",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::DateTime => "datetime",
            Self::Duration => "duration",
            Self::Uuid => "uuid",
            Self::HashId => "hashid",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A converted argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Char(char),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    DateTime(DateTime<Utc>),
    Duration(Duration),
    Uuid(Uuid),
    HashId(HashId),
}

impl ArgValue {
    /// The type this value belongs to.
    pub fn ty(&self) -> ArgType {
        match self {
            Self::String(_) => ArgType::String,
            Self::Char(_) => ArgType::Char,
            Self::Bool(_) => ArgType::Bool,
            Self::I8(_) => ArgType::I8,
            Self::I16(_) => ArgType::I16,
            Self::I32(_) => ArgType::I32,
            Self::I64(_) => ArgType::I64,
            Self::U8(_) => ArgType::U8,
            Self::U16(_) => ArgType::U16,
            Self::U32(_) => ArgType::U32,
            Self::U64(_) => ArgType::U64,
            Self::F32(_) => ArgType::F32,
            Self::F64(_) => ArgType::F64,
            Self::DateTime(_) => ArgType::DateTime,
            Self::Duration(_) => ArgType::Duration,
            Self::Uuid(_) => ArgType::Uuid,
            Self::HashId(_) => ArgType::HashId,
        }
    }
}

macro_rules! arg_value_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

arg_value_from! {
    String => String,
    Char => char,
    Bool => bool,
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    U8 => u8,
    U16 => u16,
    U32 => u32,
    U64 => u64,
    F32 => f32,
    F64 => f64,
    DateTime => DateTime<Utc>,
    Duration => Duration,
    Uuid => Uuid,
    HashId => HashId,
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Converts one token; the error string explains the rejection.
pub type ConverterFn = Arc<dyn Fn(&str) -> Result<ArgValue, String> + Send + Sync>;

fn parsed<T>(wrap: fn(T) -> ArgValue) -> ConverterFn
where
    T: FromStr + 'static,
    T::Err: fmt::Display,
{
    Arc::new(move |token: &str| token.parse::<T>().map(wrap).map_err(|e| e.to_string()))
}

/// Table of converters keyed by parameter type.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<ArgType, ConverterFn>,
}

impl ConverterRegistry {
    /// A registry without converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// A registry with a strict converter for every [`ArgType`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ArgType::String, Arc::new(|t: &str| Ok(ArgValue::String(t.to_string()))));
        registry.register(ArgType::Char, Arc::new(convert_char));
        registry.register(ArgType::Bool, Arc::new(convert_bool));
        registry.register(ArgType::I8, parsed(ArgValue::I8));
        registry.register(ArgType::I16, parsed(ArgValue::I16));
        registry.register(ArgType::I32, parsed(ArgValue::I32));
        registry.register(ArgType::I64, parsed(ArgValue::I64));
        registry.register(ArgType::U8, parsed(ArgValue::U8));
        registry.register(ArgType::U16, parsed(ArgValue::U16));
        registry.register(ArgType::U32, parsed(ArgValue::U32));
        registry.register(ArgType::U64, parsed(ArgValue::U64));
        registry.register(ArgType::F32, parsed(ArgValue::F32));
        registry.register(ArgType::F64, parsed(ArgValue::F64));
        registry.register(ArgType::DateTime, Arc::new(convert_datetime));
        registry.register(ArgType::Duration, Arc::new(convert_duration));
        registry.register(ArgType::Uuid, Arc::new(convert_uuid));
        registry.register(ArgType::HashId, parsed(ArgValue::HashId));
        registry
    }

    /// Add or replace the converter for `ty`.
    pub fn register(&mut self, ty: ArgType, converter: ConverterFn) {
        self.converters.insert(ty, converter);
    }

    pub fn get(&self, ty: ArgType) -> Option<ConverterFn> {
        self.converters.get(&ty).cloned()
    }

    pub fn supports(&self, ty: ArgType) -> bool {
        self.converters.contains_key(&ty)
    }

    /// Convert `token` as `ty`.
    pub fn convert(&self, ty: ArgType, token: &str) -> Result<ArgValue, String> {
        match self.converters.get(&ty) {
            Some(convert) => convert(token),
            None => Err(format!("no converter for {ty}")),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<ArgType> = self.converters.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("ConverterRegistry").field("types", &types).finish()
    }
}

// ============================================================================
// Default converters
// ============================================================================

fn convert_char(token: &str) -> Result<ArgValue, String> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(ArgValue::Char(c)),
        _ => Err("expected exactly one character".to_string()),
    }
}

fn convert_bool(token: &str) -> Result<ArgValue, String> {
    if token.eq_ignore_ascii_case("true") {
        Ok(ArgValue::Bool(true))
    } else if token.eq_ignore_ascii_case("false") {
        Ok(ArgValue::Bool(false))
    } else {
        Err("expected true or false".to_string())
    }
}

fn convert_uuid(token: &str) -> Result<ArgValue, String> {
    Uuid::parse_str(token)
        .map(ArgValue::Uuid)
        .map_err(|e| e.to_string())
}

/// RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` read as UTC, or a bare date at
/// UTC midnight.
fn convert_datetime(token: &str) -> Result<ArgValue, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(ArgValue::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ArgValue::DateTime(naive.and_utc()));
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| ArgValue::DateTime(naive.and_utc()))
        .ok_or_else(|| "expected an RFC 3339 timestamp or YYYY-MM-DD".to_string())
}

/// `90s`, `15m`, `2h`, `3d`, a bare day count, or `[-][d.]hh:mm[:ss[.fffffff]]`.
fn convert_duration(token: &str) -> Result<ArgValue, String> {
    parse_duration(token)
        .map(ArgValue::Duration)
        .ok_or_else(|| "expected 90s, 15m, 2h, 3d, a day count, or [d.]hh:mm[:ss]".to_string())
}

fn parse_duration(token: &str) -> Option<Duration> {
    if token.is_empty() {
        return None;
    }

    if let Some((unit_at, unit)) = token.char_indices().last()
        && unit.is_ascii_alphabetic()
    {
        let count: i64 = token[..unit_at].parse().ok()?;
        return match unit {
            's' => Duration::try_seconds(count),
            'm' => Duration::try_minutes(count),
            'h' => Duration::try_hours(count),
            'd' => Duration::try_days(count),
            _ => None,
        };
    }

    if let Ok(days) = token.parse::<i64>() {
        return Duration::try_days(days);
    }

    parse_clock_duration(token)
}

fn parse_clock_duration(token: &str) -> Option<Duration> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let mut parts = body.split(':');
    let head = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (digits(days)?, digits(hours)?),
        None => (0, digits(head)?),
    };
    let minutes = digits(minutes)?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    let (secs, nanos) = match seconds {
        None => (0, 0),
        Some(seconds) => {
            let (whole, fraction) = match seconds.split_once('.') {
                Some((whole, fraction)) => (whole, Some(fraction)),
                None => (seconds, None),
            };
            let whole = digits(whole)?;
            if whole > 59 {
                return None;
            }
            let nanos = match fraction {
                None => 0,
                Some(f) if !f.is_empty() && f.len() <= 7 => {
                    let scaled = format!("{f:0<9}");
                    digits(&scaled)?
                }
                Some(_) => return None,
            };
            (whole, nanos)
        }
    };

    let total = Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(secs)?)?
        .checked_add(&Duration::nanoseconds(nanos))?;
    Some(if negative { -total } else { total })
}

/// Parse a non-empty run of ASCII digits.
fn digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn convert(ty: ArgType, token: &str) -> Result<ArgValue, String> {
        ConverterRegistry::with_defaults().convert(ty, token)
    }

    #[test]
    fn every_type_has_a_default_converter() {
        let registry = ConverterRegistry::with_defaults();
        for ty in ArgType::ALL {
            assert!(registry.supports(ty), "no converter for {ty}");
        }
    }

    #[test]
    fn integers_are_strict() {
        assert_eq!(convert(ArgType::I32, "7"), Ok(ArgValue::I32(7)));
        assert!(convert(ArgType::I32, "x").is_err());
        assert!(convert(ArgType::I32, " 7").is_err());
        assert!(convert(ArgType::I32, "7abc").is_err());
        assert!(convert(ArgType::U8, "256").is_err());
        assert!(convert(ArgType::U32, "-1").is_err());
    }

    #[test]
    fn bool_ignores_case_only() {
        assert_eq!(convert(ArgType::Bool, "TRUE"), Ok(ArgValue::Bool(true)));
        assert_eq!(convert(ArgType::Bool, "False"), Ok(ArgValue::Bool(false)));
        assert!(convert(ArgType::Bool, "yes").is_err());
        assert!(convert(ArgType::Bool, "1").is_err());
    }

    #[test]
    fn char_requires_one_character() {
        assert_eq!(convert(ArgType::Char, "é"), Ok(ArgValue::Char('é')));
        assert!(convert(ArgType::Char, "").is_err());
        assert!(convert(ArgType::Char, "ab").is_err());
    }

    #[test]
    fn datetime_forms() {
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(convert(ArgType::DateTime, "2024-03-01"), Ok(ArgValue::DateTime(midnight)));

        let noon = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            convert(ArgType::DateTime, "2024-03-01T14:00:00+02:00"),
            Ok(ArgValue::DateTime(noon))
        );
        assert_eq!(
            convert(ArgType::DateTime, "2024-03-01T12:00:00"),
            Ok(ArgValue::DateTime(noon))
        );
        assert!(convert(ArgType::DateTime, "2024-13-01").is_err());
        assert!(convert(ArgType::DateTime, "yesterday").is_err());
    }

    #[test]
    fn duration_suffixes_and_day_counts() {
        assert_eq!(parse_duration("90s"), Some(Duration::seconds(90)));
        assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_duration("2h"), Some(Duration::hours(2)));
        assert_eq!(parse_duration("3d"), Some(Duration::days(3)));
        assert_eq!(parse_duration("3"), Some(Duration::days(3)));
        assert_eq!(parse_duration("5w"), None);
        assert_eq!(parse_duration("s"), None);
    }

    #[test]
    fn duration_clock_form() {
        assert_eq!(
            parse_duration("01:30"),
            Some(Duration::hours(1) + Duration::minutes(30))
        );
        assert_eq!(
            parse_duration("1.02:03:04"),
            Some(Duration::days(1) + Duration::hours(2) + Duration::minutes(3) + Duration::seconds(4))
        );
        assert_eq!(
            parse_duration("-00:00:01.5"),
            Some(-Duration::milliseconds(1500))
        );
        assert_eq!(parse_duration("24:00"), None);
        assert_eq!(parse_duration("00:60"), None);
        assert_eq!(parse_duration("00:00:00.12345678"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }

    #[test]
    fn hashid_and_uuid_validate() {
        assert!(convert(ArgType::HashId, "Ann6LewA").is_ok());
        assert!(convert(ArgType::HashId, "short").is_err());
        assert!(convert(ArgType::Uuid, "00000000-0000-0000-0000-000000000001").is_ok());
        assert!(convert(ArgType::Uuid, "not-a-uuid").is_err());
    }

    #[test]
    fn registered_converter_overrides_default() {
        let mut registry = ConverterRegistry::with_defaults();
        registry.register(
            ArgType::Bool,
            Arc::new(|t: &str| Ok(ArgValue::Bool(matches!(t, "yes" | "y")))),
        );
        assert_eq!(registry.convert(ArgType::Bool, "yes"), Ok(ArgValue::Bool(true)));
    }

    #[test]
    fn empty_registry_rejects_everything() {
        let registry = ConverterRegistry::empty();
        assert!(!registry.supports(ArgType::String));
        assert!(registry.convert(ArgType::String, "x").is_err());
    }
}
