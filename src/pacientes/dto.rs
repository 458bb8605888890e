use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::flash::Flash;
use crate::pacientes::cpf;
use crate::pacientes::repo::Paciente;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registration/edit form. The CPF is kept raw here; normalization and the
/// create/edit rules live in the validator and the repo.
#[derive(Debug, Deserialize)]
pub struct PacienteForm {
    pub nome: String,
    pub cpf: String,
    pub telefone: String,
    pub email: String,
}

impl PacienteForm {
    /// Field-level checks shared by create and edit. Returns the form with
    /// nome trimmed and email lowercased.
    pub fn validar(mut self) -> Result<Self, AppError> {
        self.nome = self.nome.trim().to_string();
        let len = self.nome.chars().count();
        if !(3..=100).contains(&len) {
            return Err(AppError::InvalidFormat(
                "Nome deve ter entre 3 e 100 caracteres".to_string(),
            ));
        }
        if self.telefone.trim().is_empty() {
            return Err(AppError::InvalidFormat(
                "Telefone é obrigatório".to_string(),
            ));
        }
        self.email = self.email.trim().to_lowercase();
        if !is_valid_email(&self.email) {
            return Err(AppError::InvalidFormat("Email inválido".to_string()));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct BuscaForm {
    pub termo: String,
}

#[derive(Debug, Serialize)]
pub struct PacienteView {
    pub id: i64,
    pub nome: String,
    pub cpf: String,
    pub cpf_formatado: String,
    pub telefone: String,
    pub email: String,
}

impl From<Paciente> for PacienteView {
    fn from(p: Paciente) -> Self {
        let cpf_formatado = cpf::formatado(&p.cpf);
        Self {
            id: p.id,
            nome: p.nome,
            cpf: p.cpf,
            cpf_formatado,
            telefone: p.telefone,
            email: p.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CadastroView {
    pub flash: Option<Flash>,
}

#[derive(Debug, Serialize)]
pub struct ListaView {
    pub flash: Option<Flash>,
    pub pacientes: Vec<PacienteView>,
}

#[derive(Debug, Serialize)]
pub struct BuscaView {
    pub flash: Option<Flash>,
    pub termo: Option<String>,
    pub pacientes: Vec<PacienteView>,
}

#[derive(Debug, Serialize)]
pub struct DetalhesView {
    pub flash: Option<Flash>,
    pub paciente: PacienteView,
    pub atendimentos: Vec<crate::atendimentos::dto::AtendimentoView>,
}

#[derive(Debug, Serialize)]
pub struct EditarView {
    pub flash: Option<Flash>,
    pub paciente: PacienteView,
}
