use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;

use crate::atendimentos::dto::{
    AgendarView, AtendimentoForm, AtendimentoView, EditarView, ListaView, PacienteChoice,
};
use crate::atendimentos::repo::Atendimento;
use crate::auth::session::CurrentUser;
use crate::error::AppError;
use crate::flash::{self, Flash};
use crate::pacientes::repo::Paciente;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/atendimentos", get(listar))
        .route("/atendimentos/agendar", get(agendar_form).post(agendar))
        .route("/atendimentos/editar/:id", get(editar_form).post(editar))
        .route("/atendimentos/excluir/:id", post(excluir))
}

#[instrument(skip_all)]
pub async fn listar(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (flash, clear) = flash::take(&headers);
    let atendimentos = Atendimento::list_all(&state.db)
        .await?
        .into_iter()
        .map(AtendimentoView::from)
        .collect();
    Ok((clear, Json(ListaView { flash, atendimentos })))
}

#[instrument(skip_all)]
pub async fn agendar_form(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (flash, clear) = flash::take(&headers);
    let pacientes = Paciente::choices(&state.db)
        .await?
        .into_iter()
        .map(PacienteChoice::from)
        .collect();
    Ok((clear, Json(AgendarView { flash, pacientes })))
}

#[instrument(skip_all, fields(paciente_id = form.paciente_id))]
pub async fn agendar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Form(form): Form<AtendimentoForm>,
) -> Response {
    let input = match form.validar() {
        Ok(i) => i,
        Err(e) => return flash::redirect("/atendimentos/agendar", Flash::danger(e.to_string())),
    };
    match Atendimento::schedule(&state.db, input).await {
        Ok(_) => flash::redirect(
            "/atendimentos",
            Flash::success("Atendimento agendado com sucesso!"),
        ),
        Err(AppError::NotFound) => flash::redirect(
            "/atendimentos/agendar",
            Flash::danger("Paciente não encontrado"),
        ),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all, fields(atendimento_id = id))]
pub async fn editar_form(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (flash, clear) = flash::take(&headers);
    let atendimento = Atendimento::find_com_paciente(&state.db, id).await?;
    let pacientes = Paciente::choices(&state.db)
        .await?
        .into_iter()
        .map(PacienteChoice::from)
        .collect();
    Ok((
        clear,
        Json(EditarView {
            flash,
            atendimento: atendimento.into(),
            pacientes,
        }),
    ))
}

#[instrument(skip_all, fields(atendimento_id = id))]
pub async fn editar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<AtendimentoForm>,
) -> Response {
    let input = match form.validar() {
        Ok(i) => i,
        Err(e) => {
            return flash::redirect(
                &format!("/atendimentos/editar/{}", id),
                Flash::danger(e.to_string()),
            )
        }
    };
    match Atendimento::reschedule(&state.db, id, input).await {
        Ok(_) => flash::redirect(
            "/atendimentos",
            Flash::success("Atendimento atualizado com sucesso!"),
        ),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all, fields(atendimento_id = id))]
pub async fn excluir(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Response {
    match Atendimento::cancel(&state.db, id).await {
        Ok(()) => flash::redirect(
            "/atendimentos",
            Flash::success("Atendimento excluído com sucesso!"),
        ),
        Err(e) => e.into_response(),
    }
}
