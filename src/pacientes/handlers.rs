use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;

use crate::atendimentos::dto::AtendimentoView;
use crate::atendimentos::repo::Atendimento;
use crate::auth::session::CurrentUser;
use crate::error::AppError;
use crate::flash::{self, Flash};
use crate::pacientes::dto::{
    BuscaForm, BuscaView, CadastroView, DetalhesView, EditarView, ListaView, PacienteForm,
    PacienteView,
};
use crate::pacientes::repo::Paciente;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pacientes", get(listar))
        .route("/pacientes/cadastrar", get(cadastrar_form).post(cadastrar))
        .route("/pacientes/buscar", get(buscar_form).post(buscar))
        .route("/pacientes/editar/:id", get(editar_form).post(editar))
        .route("/pacientes/excluir/:id", post(excluir))
        .route("/pacientes/:id", get(detalhes))
}

#[instrument(skip_all)]
pub async fn listar(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (flash, clear) = flash::take(&headers);
    let pacientes = Paciente::list(&state.db)
        .await?
        .into_iter()
        .map(PacienteView::from)
        .collect();
    Ok((clear, Json(ListaView { flash, pacientes })))
}

#[instrument(skip_all)]
pub async fn cadastrar_form(_user: CurrentUser, headers: HeaderMap) -> impl IntoResponse {
    let (flash, clear) = flash::take(&headers);
    (clear, Json(CadastroView { flash }))
}

#[instrument(skip_all)]
pub async fn cadastrar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Form(form): Form<PacienteForm>,
) -> Response {
    match Paciente::create(&state.db, form).await {
        Ok(_) => flash::redirect("/pacientes", Flash::success("Paciente cadastrado com sucesso!")),
        Err(e) if e.is_validation() => {
            flash::redirect("/pacientes/cadastrar", Flash::danger(e.to_string()))
        }
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all)]
pub async fn buscar_form(_user: CurrentUser, headers: HeaderMap) -> impl IntoResponse {
    let (flash, clear) = flash::take(&headers);
    (
        clear,
        Json(BuscaView {
            flash,
            termo: None,
            pacientes: Vec::new(),
        }),
    )
}

#[instrument(skip_all, fields(termo = %form.termo))]
pub async fn buscar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Form(form): Form<BuscaForm>,
) -> Result<impl IntoResponse, AppError> {
    let pacientes = Paciente::search(&state.db, &form.termo)
        .await?
        .into_iter()
        .map(PacienteView::from)
        .collect();
    Ok(Json(BuscaView {
        flash: None,
        termo: Some(form.termo),
        pacientes,
    }))
}

#[instrument(skip_all, fields(paciente_id = id))]
pub async fn editar_form(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (flash, clear) = flash::take(&headers);
    let paciente = Paciente::find(&state.db, id).await?;
    Ok((
        clear,
        Json(EditarView {
            flash,
            paciente: paciente.into(),
        }),
    ))
}

#[instrument(skip_all, fields(paciente_id = id))]
pub async fn editar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<PacienteForm>,
) -> Response {
    match Paciente::update(&state.db, id, form).await {
        Ok(_) => flash::redirect("/pacientes", Flash::success("Paciente atualizado com sucesso!")),
        Err(e) if e.is_validation() => flash::redirect(
            &format!("/pacientes/editar/{}", id),
            Flash::danger(e.to_string()),
        ),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all, fields(paciente_id = id))]
pub async fn excluir(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Response {
    match Paciente::delete(&state.db, id).await {
        Ok(()) => flash::redirect("/pacientes", Flash::success("Paciente excluído com sucesso!")),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip_all, fields(paciente_id = id))]
pub async fn detalhes(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (flash, clear) = flash::take(&headers);
    let paciente = Paciente::find(&state.db, id).await?;
    let atendimentos = Atendimento::list_for_paciente(&state.db, id)
        .await?
        .into_iter()
        .map(AtendimentoView::from)
        .collect();
    Ok((
        clear,
        Json(DetalhesView {
            flash,
            paciente: paciente.into(),
            atendimentos,
        }),
    ))
}
