use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::atendimentos::repo::AtendimentoComPaciente;
use crate::error::AppError;
use crate::flash::Flash;

/// Wire format for the data field, matching an HTML datetime-local input.
pub static DATA_FORMATO: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

/// Scheduling/edit form.
#[derive(Debug, Deserialize)]
pub struct AtendimentoForm {
    pub paciente_id: i64,
    pub data: String,
    pub descricao: String,
}

/// Validated form data with the timestamp parsed.
#[derive(Debug, Clone)]
pub struct AtendimentoInput {
    pub paciente_id: i64,
    pub data: PrimitiveDateTime,
    pub descricao: String,
}

impl AtendimentoForm {
    pub fn validar(self) -> Result<AtendimentoInput, AppError> {
        let data = PrimitiveDateTime::parse(&self.data, DATA_FORMATO).map_err(|_| {
            AppError::InvalidFormat("Data e hora inválidas, use AAAA-MM-DDTHH:MM".to_string())
        })?;
        let descricao = self.descricao.trim().to_string();
        if descricao.is_empty() {
            return Err(AppError::InvalidFormat(
                "Descrição é obrigatória".to_string(),
            ));
        }
        Ok(AtendimentoInput {
            paciente_id: self.paciente_id,
            data,
            descricao,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AtendimentoView {
    pub id: i64,
    pub paciente_id: i64,
    pub paciente_nome: String,
    pub data: String,
    pub descricao: String,
}

impl From<AtendimentoComPaciente> for AtendimentoView {
    fn from(a: AtendimentoComPaciente) -> Self {
        let data = a
            .data
            .format(DATA_FORMATO)
            .unwrap_or_else(|_| a.data.to_string());
        Self {
            id: a.id,
            paciente_id: a.paciente_id,
            paciente_nome: a.paciente_nome,
            data,
            descricao: a.descricao,
        }
    }
}

/// Entry in the paciente select of the scheduling form.
#[derive(Debug, Serialize)]
pub struct PacienteChoice {
    pub id: i64,
    pub nome: String,
}

impl From<(i64, String)> for PacienteChoice {
    fn from((id, nome): (i64, String)) -> Self {
        Self { id, nome }
    }
}

#[derive(Debug, Serialize)]
pub struct ListaView {
    pub flash: Option<Flash>,
    pub atendimentos: Vec<AtendimentoView>,
}

#[derive(Debug, Serialize)]
pub struct AgendarView {
    pub flash: Option<Flash>,
    pub pacientes: Vec<PacienteChoice>,
}

#[derive(Debug, Serialize)]
pub struct EditarView {
    pub flash: Option<Flash>,
    pub atendimento: AtendimentoView,
    pub pacientes: Vec<PacienteChoice>,
}
