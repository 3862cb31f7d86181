use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::ChatMessageResponse;
use crate::state::AppState;
use actix_web::{get, web};

/// Conversation history with the peer named in the path, ascending by
/// timestamp. The caller's own identity comes from the validated token,
/// never from the path.
#[get("/chat/messages/{peer_id}")]
pub async fn get_messages(
    user: AuthenticatedUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<web::Json<Vec<ChatMessageResponse>>, AppError> {
    let peer_id = path.into_inner();

    let messages = state.store.fetch_history(&user.id, &peer_id).await?;

    Ok(web::Json(
        messages.into_iter().map(ChatMessageResponse::from).collect(),
    ))
}
