//! CPF normalization and validation.
//!
//! Accepts the identifier with or without the usual punctuation
//! ("123.456.789-01" or "12345678901") and reduces it to its 11 digits.
//! Only the length and the repeated-digit classes are checked; the official
//! modulo-11 check digits are deliberately not verified, matching the
//! behavior this system has always had (see DESIGN.md).

use crate::error::AppError;

/// Context a CPF is validated in. On edit the stored value is the only one
/// accepted: a CPF can never change once registered.
#[derive(Debug, Clone, Copy)]
pub enum CpfContext<'a> {
    Create,
    Edit { stored: &'a str },
}

/// Strip everything that is not an ASCII digit.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize and validate a raw CPF, returning its canonical 11-digit form.
pub fn validate(raw: &str, ctx: CpfContext<'_>) -> Result<String, AppError> {
    let cpf = normalize(raw);
    if cpf.len() != 11 {
        return Err(AppError::InvalidFormat(
            "CPF deve ter 11 dígitos".to_string(),
        ));
    }
    let first = cpf.as_bytes()[0];
    if cpf.bytes().all(|b| b == first) {
        return Err(AppError::InvalidValue("CPF inválido".to_string()));
    }
    if let CpfContext::Edit { stored } = ctx {
        if cpf != stored {
            return Err(AppError::ImmutableField);
        }
    }
    Ok(cpf)
}

/// Display form: "123.456.789-01". Expects an already normalized CPF.
pub fn formatado(cpf: &str) -> String {
    if cpf.len() != 11 {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &cpf[..3], &cpf[3..6], &cpf[6..9], &cpf[9..])
}
