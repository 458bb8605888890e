use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use crate::error::AppError;
use crate::pacientes::cpf::{self, CpfContext};
use crate::pacientes::dto::PacienteForm;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Paciente {
    pub id: i64,
    pub nome: String,
    pub cpf: String,
    pub telefone: String,
    pub email: String,
}

impl Paciente {
    /// Register a new paciente. The duplicate pre-check and the insert run in
    /// one transaction; a storage-level UNIQUE violation still surfaces as
    /// `DuplicateKey` in case a concurrent insert wins the race.
    pub async fn create(db: &SqlitePool, form: PacienteForm) -> Result<Paciente, AppError> {
        let form = form.validar()?;
        let cpf = cpf::validate(&form.cpf, CpfContext::Create)?;

        let mut tx = db.begin().await?;
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM pacientes WHERE cpf = ?")
            .bind(&cpf)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::DuplicateKey);
        }

        let paciente = sqlx::query_as::<_, Paciente>(
            r#"
            INSERT INTO pacientes (nome, cpf, telefone, email)
            VALUES (?, ?, ?, ?)
            RETURNING id, nome, cpf, telefone, email
            "#,
        )
        .bind(&form.nome)
        .bind(&cpf)
        .bind(&form.telefone)
        .bind(&form.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_cpf)?;
        tx.commit().await?;

        info!(paciente_id = paciente.id, "paciente registered");
        Ok(paciente)
    }

    /// Update nome, telefone and email. The submitted CPF must match the
    /// stored one; it can never change once registered.
    pub async fn update(db: &SqlitePool, id: i64, form: PacienteForm) -> Result<Paciente, AppError> {
        let form = form.validar()?;

        let mut tx = db.begin().await?;
        let stored = sqlx::query_as::<_, Paciente>(
            "SELECT id, nome, cpf, telefone, email FROM pacientes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        cpf::validate(&form.cpf, CpfContext::Edit { stored: &stored.cpf })?;

        let paciente = sqlx::query_as::<_, Paciente>(
            r#"
            UPDATE pacientes
            SET nome = ?, telefone = ?, email = ?
            WHERE id = ?
            RETURNING id, nome, cpf, telefone, email
            "#,
        )
        .bind(&form.nome)
        .bind(&form.telefone)
        .bind(&form.email)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(paciente_id = id, "paciente updated");
        Ok(paciente)
    }

    /// Delete a paciente and, in the same transaction, every atendimento that
    /// references it.
    pub async fn delete(db: &SqlitePool, id: i64) -> Result<(), AppError> {
        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM atendimentos WHERE paciente_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM pacientes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        tx.commit().await?;

        info!(paciente_id = id, "paciente deleted");
        Ok(())
    }

    pub async fn find(db: &SqlitePool, id: i64) -> Result<Paciente, AppError> {
        sqlx::query_as::<_, Paciente>(
            "SELECT id, nome, cpf, telefone, email FROM pacientes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)
    }

    pub async fn list(db: &SqlitePool) -> Result<Vec<Paciente>, AppError> {
        let rows = sqlx::query_as::<_, Paciente>(
            "SELECT id, nome, cpf, telefone, email FROM pacientes ORDER BY nome",
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Substring match across nome, cpf and email. SQLite LIKE, so matching
    /// is case-insensitive for ASCII.
    pub async fn search(db: &SqlitePool, termo: &str) -> Result<Vec<Paciente>, AppError> {
        let like = format!("%{}%", termo);
        let rows = sqlx::query_as::<_, Paciente>(
            r#"
            SELECT id, nome, cpf, telefone, email
            FROM pacientes
            WHERE nome LIKE ?1 OR cpf LIKE ?1 OR email LIKE ?1
            ORDER BY nome
            "#,
        )
        .bind(&like)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// (id, nome) pairs for the atendimento form's paciente select, ordered
    /// by nome.
    pub async fn choices(db: &SqlitePool) -> Result<Vec<(i64, String)>, AppError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, nome FROM pacientes ORDER BY nome")
                .fetch_all(db)
                .await?;
        Ok(rows)
    }
}

fn map_unique_cpf(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db)
            if db.message().contains("UNIQUE constraint failed: pacientes.cpf") =>
        {
            AppError::DuplicateKey
        }
        _ => AppError::Persistence(e),
    }
}
