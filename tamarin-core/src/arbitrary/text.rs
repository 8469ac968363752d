use super::CombinableArbitrary;
use crate::data::Source;
use crate::error::{Result, TamarinError};
use crate::property::CharSet;

const ALPHABETIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMERIC: &str = "0123456789";
const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

impl CharSet {
    /// Draw one character of the set.
    pub fn pick(self, source: &mut Source) -> char {
        let alphabet = match self {
            CharSet::Alphabetic => ALPHABETIC,
            CharSet::Numeric => NUMERIC,
            CharSet::Alphanumeric => ALPHANUMERIC,
            CharSet::Ascii => {
                let code = source.int_in(0x20, 0x7e) as u8;
                return code as char;
            }
        };
        let bytes = alphabet.as_bytes();
        bytes[source.index(bytes.len())] as char
    }
}

/// String generator spec: length range, character set and blankness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringArbitrary {
    min_length: usize,
    max_length: usize,
    charset: CharSet,
    not_blank: bool,
}

impl Default for StringArbitrary {
    fn default() -> Self {
        StringArbitrary {
            min_length: 0,
            max_length: 10,
            charset: CharSet::default(),
            not_blank: false,
        }
    }
}

impl StringArbitrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive length range in characters.
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn charset(mut self, charset: CharSet) -> Self {
        self.charset = charset;
        self
    }

    /// Require at least one non-whitespace character.
    pub fn not_blank(mut self) -> Self {
        self.not_blank = true;
        self.min_length = self.min_length.max(1);
        self
    }

    pub fn build(&self) -> Result<CombinableArbitrary<String>> {
        let spec = *self;
        if spec.min_length > spec.max_length {
            return Err(TamarinError::ConstraintConflict {
                property: "string".to_string(),
                message: format!(
                    "minimum length {} exceeds maximum {}",
                    spec.min_length, spec.max_length
                ),
            });
        }
        Ok(CombinableArbitrary::from_fn(move |source| {
            let length = source.int_in(spec.min_length as i128, spec.max_length as i128) as usize;
            let mut chars: Vec<char> = (0..length).map(|_| spec.charset.pick(source)).collect();
            if spec.not_blank && chars.iter().all(|c| c.is_whitespace()) {
                if let Some(first) = chars.first_mut() {
                    *first = CharSet::Alphanumeric.pick(source);
                }
            }
            Ok(chars.into_iter().collect())
        }))
    }
}
