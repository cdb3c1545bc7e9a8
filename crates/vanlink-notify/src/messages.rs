//! Notification texts shown to riders and drivers.

use vanlink_core::{ChatId, RouteId};
use vanlink_store::Route;

use crate::types::PushPayload;

/// App screen showing a trip on the map.
pub const SCREEN_TRIP: &str = "tela_viagem";

/// App screen listing chats.
pub const SCREEN_CHAT_LIST: &str = "tela_lista_chats";

/// Route name used when the route has none.
pub const FALLBACK_ROUTE_NAME: &str = "Sua rota";

/// Student name used when the account has no display name.
pub const FALLBACK_STUDENT_NAME: &str = "Um aluno";

fn route_name(route: &Route) -> &str {
    route
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_ROUTE_NAME)
}

fn trip_payload(title: &str, body: String, route_id: &RouteId) -> PushPayload {
    PushPayload::new(title, body)
        .with_data("screen", SCREEN_TRIP)
        .with_data("rotaId", route_id.as_str())
}

/// The driver started the route.
#[must_use]
pub fn route_started(route: &Route) -> PushPayload {
    trip_payload(
        "Sua van está a caminho!",
        format!(
            "O motorista iniciou a rota \"{}\". Acompanhe a viagem no mapa.",
            route_name(route)
        ),
        &route.route_id,
    )
}

/// The route starts within the proximity window.
#[must_use]
pub fn route_departing_soon(route: &Route) -> PushPayload {
    trip_payload(
        "Sua van está quase saindo!",
        format!(
            "Faltam 10 minutos para o motorista começar a buscar os alunos da rota \"{}\".",
            route_name(route)
        ),
        &route.route_id,
    )
}

/// A student asked the driver to start a conversation.
#[must_use]
pub fn chat_inquiry(chat_id: &ChatId, student_name: Option<&str>) -> PushPayload {
    let name = student_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_STUDENT_NAME);

    PushPayload::new(
        "Nova solicitação de conversa",
        format!("{name} quer iniciar uma conversa com você."),
    )
    .with_data("screen", SCREEN_CHAT_LIST)
    .with_data("chatId", chat_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanlink_store::RouteStatus;

    fn route(name: Option<&str>) -> Route {
        Route {
            route_id: RouteId::new("route-1").unwrap(),
            name: name.map(str::to_string),
            status: RouteStatus::InProgress,
            student_ids: Vec::new(),
            start_time: None,
            driver_id: None,
        }
    }

    #[test]
    fn route_started_names_route() {
        let payload = route_started(&route(Some("Manhã - Centro")));
        assert_eq!(payload.title, "Sua van está a caminho!");
        assert!(payload.body.contains("\"Manhã - Centro\""));
        assert_eq!(payload.data.get("screen").map(String::as_str), Some(SCREEN_TRIP));
        assert_eq!(payload.data.get("rotaId").map(String::as_str), Some("route-1"));
        assert_eq!(payload.sound, "default");
    }

    #[test]
    fn unnamed_route_uses_fallback() {
        assert!(route_started(&route(None)).body.contains("\"Sua rota\""));
        assert!(route_departing_soon(&route(Some("  "))).body.contains("\"Sua rota\""));
    }

    #[test]
    fn chat_inquiry_names_student() {
        let chat_id = ChatId::new("chat-1").unwrap();

        let payload = chat_inquiry(&chat_id, Some("Maria"));
        assert_eq!(payload.body, "Maria quer iniciar uma conversa com você.");
        assert_eq!(payload.data.get("chatId").map(String::as_str), Some("chat-1"));

        let payload = chat_inquiry(&chat_id, None);
        assert!(payload.body.starts_with("Um aluno"));
    }
}
