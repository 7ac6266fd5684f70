//! OpenAPI document for every HTTP endpoint, served through Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `/authentication/login`, or a hosted token from `/api/auth` for `/api/*`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("provokely_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::comments::list_comments,
        handlers::comments::create_comment,
        handlers::comments::pending_approvals,
        handlers::comments::comment_statistics,
        handlers::comments::get_comment,
        handlers::comments::delete_comment,
        handlers::comments::approve_comment,
        handlers::comments::decline_comment,
        handlers::comments::analyze_sentiment,
        handlers::posts::list_posts,
        handlers::posts::create_post,
        handlers::posts::post_statistics,
        handlers::posts::get_post,
        handlers::posts::post_comments,
        handlers::settings::get_settings,
        handlers::settings::update_settings,
        handlers::settings::toggle_auto_comment,
        handlers::notifications::list_notifications,
        handlers::notifications::get_unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::notification_stream,
        handlers::instagram::create_account,
        handlers::instagram::list_accounts,
        handlers::instagram::get_account,
        handlers::instagram::delete_account,
        handlers::instagram::sync_posts,
        handlers::instagram::sync_comments,
        handlers::instagram::account_statistics,
        handlers::instagram::mobile_status,
        handlers::webhooks::verify_instagram_webhook,
        handlers::webhooks::handle_instagram_webhook,
        handlers::webhooks::receive_instagram_webhook,
        handlers::webhooks::list_webhook_records,
        handlers::webhooks::mark_webhook_processed,
        handlers::hosted::hosted_auth,
        handlers::hosted::generate,
        handlers::hosted::subscription_status,
        handlers::hosted::list_usage,
        handlers::shopify::list_stores,
        handlers::shopify::create_store,
        handlers::shopify::delete_store,
        handlers::shopify::list_reviews,
        handlers::shopify::judgeme_webhook,
    ),
    components(schemas(
        models::envelope::ErrorEnvelope,
        models::envelope::ErrorBody,
        crate::notifications::NotificationEvent,
        crate::notifications::LatestNotification,
    )),
    modifiers(&SecurityAddon),
    security(("BearerAuth" = []), ("CookieAuth" = [])),
    tags(
        (name = "authentication", description = "Dashboard accounts and sessions"),
        (name = "comments", description = "Comment moderation: sentiment, replies and the approval queue"),
        (name = "posts", description = "Monitored social posts"),
        (name = "settings", description = "Per-user moderation settings"),
        (name = "notifications", description = "Notification inbox and live unread stream"),
        (name = "instagram", description = "Connected Instagram accounts and Graph sync"),
        (name = "webhooks", description = "Meta webhook subscription and deliveries"),
        (name = "hosted", description = "Email-only AI proxy with project metering"),
        (name = "shopify", description = "Shopify stores and JudgeMe reviews"),
    ),
    info(
        title = "Provokely API",
        version = "1.0.0",
        description = "Social comment moderation with sentiment analysis and AI replies.

Every JSON response is wrapped in an envelope:

```json
{\"success\": true, \"data\": {}, \"message\": \"optional\"}
{\"success\": false, \"error\": {\"code\": \"NOT_FOUND\", \"message\": \"...\", \"details\": null}}
```",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_schemes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/comments/{id}/approve"));
        assert!(doc.paths.paths.contains_key("/notifications/stream"));
        assert!(doc.paths.paths.contains_key("/webhooks/judgeme"));

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("BearerAuth"));
        assert!(components.schemas.contains_key("ErrorEnvelope"));
    }

    #[test]
    fn test_stream_event_ids_are_uuid_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let id = &doc["components"]["schemas"]["LatestNotification"]["properties"]["id"];
        assert_eq!(id["type"], "string");
        assert_eq!(id["format"], "uuid");
    }
}
