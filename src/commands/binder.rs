//! Binding argument tokens to declared parameters.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use guildline_proto::HashId;
use uuid::Uuid;

use super::command::{ParamKind, ParameterDescriptor};
use super::converter::{ArgValue, ConverterRegistry};
use crate::error::{ArgumentError, BindingError};

/// Converters for descriptors bound without going through a registry.
fn fallback_converters() -> &'static ConverterRegistry {
    static DEFAULTS: OnceLock<ConverterRegistry> = OnceLock::new();
    DEFAULTS.get_or_init(ConverterRegistry::with_defaults)
}

/// Value bound to one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(ArgValue),
    /// Optional parameter omitted without a default.
    Missing,
    /// Raw tokens collected by a rest parameter.
    Rest(Vec<String>),
}

/// Bind `tokens` positionally to `params`.
///
/// Tokens beyond the last parameter are ignored.
pub fn bind(params: &[ParameterDescriptor], tokens: &[String]) -> Result<BoundArguments, BindingError> {
    let mut values = Vec::with_capacity(params.len());
    for (position, param) in params.iter().enumerate() {
        let token = tokens.get(position);
        let value = match (&param.kind, token) {
            (ParamKind::Rest, _) => {
                Argument::Rest(tokens.get(position..).unwrap_or_default().to_vec())
            }
            (_, Some(token)) => Argument::Value(convert(param, token)?),
            (ParamKind::Required, None) => {
                return Err(BindingError::MissingArgument {
                    parameter: param.name.clone(),
                    position,
                });
            }
            (ParamKind::Optional { default }, None) => {
                default.clone().map_or(Argument::Missing, Argument::Value)
            }
        };
        values.push(value);
    }
    Ok(BoundArguments { values })
}

fn convert(param: &ParameterDescriptor, token: &str) -> Result<ArgValue, BindingError> {
    let result = match param.converter() {
        Some(convert) => convert(token),
        None => fallback_converters().convert(param.ty, token),
    };
    result.map_err(|reason| BindingError::ArgumentFormatError {
        parameter: param.name.clone(),
        token: token.to_string(),
        ty: param.ty,
        reason,
    })
}

/// Arguments bound for one invocation, indexed by parameter position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<Argument>,
}

impl BoundArguments {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Argument] {
        &self.values
    }

    /// Read the value at `index` as `T`.
    pub fn get<T: FromArgValue>(&self, index: usize) -> Result<T, ArgumentError> {
        match self.values.get(index) {
            None => Err(ArgumentError::OutOfRange(index)),
            Some(Argument::Missing) => Err(ArgumentError::Missing(index)),
            Some(Argument::Rest(_)) => Err(ArgumentError::TypeMismatch {
                index,
                expected: T::EXPECTED,
                found: "rest",
            }),
            Some(Argument::Value(value)) => {
                T::from_arg(value).ok_or_else(|| ArgumentError::TypeMismatch {
                    index,
                    expected: T::EXPECTED,
                    found: value.ty().as_str(),
                })
            }
        }
    }

    /// Like [`get`](Self::get), but an omitted optional reads as `None`.
    pub fn get_opt<T: FromArgValue>(&self, index: usize) -> Result<Option<T>, ArgumentError> {
        match self.values.get(index) {
            Some(Argument::Missing) => Ok(None),
            _ => self.get(index).map(Some),
        }
    }

    /// Raw tokens collected by the rest parameter at `index`.
    pub fn rest(&self, index: usize) -> Result<&[String], ArgumentError> {
        match self.values.get(index) {
            None => Err(ArgumentError::OutOfRange(index)),
            Some(Argument::Rest(tokens)) => Ok(tokens),
            Some(Argument::Missing) => Err(ArgumentError::Missing(index)),
            Some(Argument::Value(value)) => Err(ArgumentError::TypeMismatch {
                index,
                expected: "rest",
                found: value.ty().as_str(),
            }),
        }
    }
}

/// Types readable from a bound [`ArgValue`].
pub trait FromArgValue: Sized {
    const EXPECTED: &'static str;

    fn from_arg(value: &ArgValue) -> Option<Self>;
}

macro_rules! from_arg_value {
    ($($variant:ident => $ty:ty, $label:literal);* $(;)?) => {
        $(
            impl FromArgValue for $ty {
                const EXPECTED: &'static str = $label;

                fn from_arg(value: &ArgValue) -> Option<Self> {
                    match value {
                        ArgValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_arg_value! {
    String => String, "string";
    Char => char, "char";
    Bool => bool, "bool";
    I8 => i8, "i8";
    I16 => i16, "i16";
    I32 => i32, "i32";
    I64 => i64, "i64";
    U8 => u8, "u8";
    U16 => u16, "u16";
    U32 => u32, "u32";
    U64 => u64, "u64";
    F32 => f32, "f32";
    F64 => f64, "f64";
    DateTime => DateTime<Utc>, "datetime";
    Duration => Duration, "duration";
    Uuid => Uuid, "uuid";
    HashId => HashId, "hashid";
}
