use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::auth::dto::{LoginForm, LoginView};
use crate::auth::password::verify_password;
use crate::auth::repo::Usuario;
use crate::auth::session::{CurrentUser, SessionKeys};
use crate::flash::{self, Flash};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

#[instrument(skip_all)]
pub async fn login_page(headers: HeaderMap) -> impl IntoResponse {
    let (flash, clear) = flash::take(&headers);
    (clear, Json(LoginView { flash }))
}

#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let user = match Usuario::find_by_username(&state.db, &form.username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!("login with unknown username");
            return flash::redirect("/login", Flash::danger("Usuário ou senha inválidos"));
        }
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return flash::redirect("/login", Flash::danger("Erro interno, tente novamente"));
        }
    };

    let valid = match verify_password(&form.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return flash::redirect("/login", Flash::danger("Erro interno, tente novamente"));
        }
    };

    if !valid {
        warn!(user_id = user.id, "login with invalid password");
        return flash::redirect("/login", Flash::danger("Usuário ou senha inválidos"));
    }

    let keys = SessionKeys::from_ref(&state);
    let token = match keys.sign(user.id, &user.username) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "session sign failed");
            return flash::redirect("/login", Flash::danger("Erro interno, tente novamente"));
        }
    };

    info!(user_id = user.id, "user logged in");
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, keys.cookie(&token).parse().unwrap());
    (headers, Redirect::to("/")).into_response()
}

#[instrument(skip_all, fields(username = %user.username))]
pub async fn logout(user: CurrentUser) -> Response {
    info!(user_id = user.id, "user logged out");
    let mut res = flash::redirect("/login", Flash::success("Você foi desconectado com sucesso."));
    res.headers_mut().append(
        header::SET_COOKIE,
        SessionKeys::clear_cookie().parse().unwrap(),
    );
    res
}
