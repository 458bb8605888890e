use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Transaction};
use time::PrimitiveDateTime;
use tracing::info;

use crate::atendimentos::dto::AtendimentoInput;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Atendimento {
    pub id: i64,
    pub paciente_id: i64,
    pub data: PrimitiveDateTime,
    pub descricao: String,
}

/// Atendimento joined with the nome of its paciente, for list views.
#[derive(Debug, Clone, FromRow)]
pub struct AtendimentoComPaciente {
    pub id: i64,
    pub paciente_id: i64,
    pub paciente_nome: String,
    pub data: PrimitiveDateTime,
    pub descricao: String,
}

impl Atendimento {
    /// Record a new atendimento. Fails with `NotFound` when the paciente does
    /// not exist; nothing is inserted in that case.
    pub async fn schedule(db: &SqlitePool, input: AtendimentoInput) -> Result<Atendimento, AppError> {
        let mut tx = db.begin().await?;
        require_paciente(&mut tx, input.paciente_id).await?;

        let atendimento = sqlx::query_as::<_, Atendimento>(
            r#"
            INSERT INTO atendimentos (paciente_id, data, descricao)
            VALUES (?, ?, ?)
            RETURNING id, paciente_id, data, descricao
            "#,
        )
        .bind(input.paciente_id)
        .bind(input.data)
        .bind(&input.descricao)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(
            atendimento_id = atendimento.id,
            paciente_id = atendimento.paciente_id,
            "atendimento scheduled"
        );
        Ok(atendimento)
    }

    /// Update timestamp, descricao and the (re-assignable) paciente link.
    pub async fn reschedule(
        db: &SqlitePool,
        id: i64,
        input: AtendimentoInput,
    ) -> Result<Atendimento, AppError> {
        let mut tx = db.begin().await?;
        require_paciente(&mut tx, input.paciente_id).await?;

        let atendimento = sqlx::query_as::<_, Atendimento>(
            r#"
            UPDATE atendimentos
            SET paciente_id = ?, data = ?, descricao = ?
            WHERE id = ?
            RETURNING id, paciente_id, data, descricao
            "#,
        )
        .bind(input.paciente_id)
        .bind(input.data)
        .bind(&input.descricao)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;
        tx.commit().await?;

        info!(atendimento_id = id, "atendimento updated");
        Ok(atendimento)
    }

    pub async fn cancel(db: &SqlitePool, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM atendimentos WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        info!(atendimento_id = id, "atendimento deleted");
        Ok(())
    }

    pub async fn find_com_paciente(
        db: &SqlitePool,
        id: i64,
    ) -> Result<AtendimentoComPaciente, AppError> {
        sqlx::query_as::<_, AtendimentoComPaciente>(
            r#"
            SELECT a.id, a.paciente_id, p.nome AS paciente_nome, a.data, a.descricao
            FROM atendimentos a
            JOIN pacientes p ON p.id = a.paciente_id
            WHERE a.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)
    }

    pub async fn list_all(db: &SqlitePool) -> Result<Vec<AtendimentoComPaciente>, AppError> {
        let rows = sqlx::query_as::<_, AtendimentoComPaciente>(
            r#"
            SELECT a.id, a.paciente_id, p.nome AS paciente_nome, a.data, a.descricao
            FROM atendimentos a
            JOIN pacientes p ON p.id = a.paciente_id
            ORDER BY a.data DESC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_paciente(
        db: &SqlitePool,
        paciente_id: i64,
    ) -> Result<Vec<AtendimentoComPaciente>, AppError> {
        let rows = sqlx::query_as::<_, AtendimentoComPaciente>(
            r#"
            SELECT a.id, a.paciente_id, p.nome AS paciente_nome, a.data, a.descricao
            FROM atendimentos a
            JOIN pacientes p ON p.id = a.paciente_id
            WHERE a.paciente_id = ?
            ORDER BY a.data DESC
            "#,
        )
        .bind(paciente_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

async fn require_paciente(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    paciente_id: i64,
) -> Result<(), AppError> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM pacientes WHERE id = ?")
        .bind(paciente_id)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(())
}
