mod common;

#[cfg(test)]
mod tests {
    use crate::common::{bearer, StaticVerifier, WEBHOOK_SECRET};
    use actix_web::{test, web, App, http::StatusCode};
    use eduresource_server::app::{not_found, AppData};
    use eduresource_server::shared::handlers::debug_handler::DebugHandler;
    use eduresource_server::shared::types::account::{NewUser, Role, User};
    use eduresource_server::shared::util::config::LimitsConfig;
    use eduresource_server::shared::util::handler::UserStore;
    use hmac::{Hmac, Mac};
    use serde_json::{json, Value};
    use sha2::Sha256;
    use std::sync::Arc;

    async fn setup() -> (AppData, Arc<DebugHandler>) {
        let store = Arc::new(DebugHandler::new());
        let data = AppData::new(store.clone(), store.clone(), Arc::new(StaticVerifier), WEBHOOK_SECRET,
            LimitsConfig::default());
        (data, store)
    }

    async fn add_user(store: &DebugHandler, name: &str, role: Role) -> User {
        store.create_user(&NewUser {
            external_id: name.to_string(),
            email: format!("{name}@example.com"),
            first_name: None,
            last_name: None,
            role,
            is_approved: true
        }).await.unwrap()
    }

    fn resource_body(title: &str) -> Value {
        json!({
            "title": title, "type": "Activity", "subject": "Math", "ageGroup": "3-4",
            "rating": 3, "description": "d", "eventDate": "2025-01-01"
        })
    }

    macro_rules! service {
        ($data: expr) => {
            test::init_service(App::new()
                .configure(|app| $data.configure(app))
                .default_service(web::route().to(not_found))).await
        };
    }

    #[actix_web::test]
    async fn missing_credentials_are_401_and_plain_users_403() {
        let (data, store) = setup().await;
        let plain = add_user(&store, "plain", Role::User).await;
        let app = service!(data);

        let req = test::TestRequest::post().uri("/v1/resources").set_json(resource_body("X")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post().uri("/v1/resources")
            .insert_header(("Authorization", "Bearer garbage"))
            .set_json(resource_body("X")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post().uri("/v1/resources")
            .insert_header(bearer(&plain)).set_json(resource_body("X")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "forbidden");
    }

    #[actix_web::test]
    async fn unregistered_subject_is_401() {
        let (data, _store) = setup().await;
        let app = service!(data);
        let req = test::TestRequest::get().uri("/v1/users/me")
            .insert_header(("Authorization", "Bearer token-nobody")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Account is not registered");
    }

    #[actix_web::test]
    async fn reject_then_get_is_404() {
        let (data, store) = setup().await;
        let admin = add_user(&store, "admin", Role::Admin).await;
        let root = add_user(&store, "root", Role::SuperAdmin).await;
        let app = service!(data);

        let req = test::TestRequest::post().uri("/v1/resources")
            .insert_header(bearer(&admin)).set_json(resource_body("X")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["isApproved"], false);
        let id = created["id"].as_i64().unwrap();

        let req = test::TestRequest::put().uri(&format!("/v1/resources/{id}/reject"))
            .insert_header(bearer(&root)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri(&format!("/v1/resources/{id}"))
            .insert_header(bearer(&root)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "notFound");
    }

    #[actix_web::test]
    async fn anonymous_listing_hides_pending() {
        let (data, store) = setup().await;
        let admin = add_user(&store, "admin", Role::Admin).await;
        let root = add_user(&store, "root", Role::SuperAdmin).await;
        let app = service!(data);

        for (user, title) in [(&admin, "Pending"), (&root, "Public")] {
            let req = test::TestRequest::post().uri("/v1/resources")
                .insert_header(bearer(user)).set_json(resource_body(title)).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri("/v1/resources").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let resources = body["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0]["title"], "Public");
    }

    #[actix_web::test]
    async fn bulk_create_returns_per_item_outcomes() {
        let (data, store) = setup().await;
        let admin = add_user(&store, "admin", Role::Admin).await;
        let app = service!(data);

        let mut bad = resource_body("Bad");
        bad["rating"] = json!(9);
        let mut malformed = resource_body("Malformed");
        malformed["rating"] = json!("three");
        let body = json!([resource_body("A"), bad, resource_body("B"), malformed]);

        let req = test::TestRequest::post().uri("/v1/resources/bulk")
            .insert_header(bearer(&admin)).set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["succeeded"], 2);
        assert_eq!(body["failed"], 2);
        assert_eq!(body["results"][1]["status"], "failure");
        assert_eq!(body["results"][1]["error"]["kind"], "validationError");
        assert!(body["results"][1]["error"]["fields"]["rating"].is_array());
        assert_eq!(body["results"][3]["index"], 3);
    }

    #[actix_web::test]
    async fn validation_errors_carry_fields() {
        let (data, store) = setup().await;
        let admin = add_user(&store, "admin", Role::Admin).await;
        let app = service!(data);

        let req = test::TestRequest::post().uri("/v1/resources")
            .insert_header(bearer(&admin)).set_json(json!({ "title": "Only a title" })).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["fields"]["rating"].is_array());
        assert!(body["fields"]["eventDate"].is_array());
    }

    #[actix_web::test]
    async fn role_escalation_over_http() {
        let (data, store) = setup().await;
        let admin = add_user(&store, "admin", Role::Admin).await;
        let root = add_user(&store, "root", Role::SuperAdmin).await;
        let target = add_user(&store, "target", Role::User).await;
        let app = service!(data);

        let req = test::TestRequest::patch().uri(&format!("/v1/users/{}/role", target.id))
            .insert_header(bearer(&admin)).set_json(json!({ "role": "superAdmin" })).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::patch().uri(&format!("/v1/users/{}/role", target.id))
            .insert_header(bearer(&root)).set_json(json!({ "role": "superAdmin" })).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["role"], "superAdmin");
    }

    fn sign(payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[actix_web::test]
    async fn webhook_requires_signature() {
        let (data, store) = setup().await;
        let app = service!(data);
        let payload = json!({
            "type": "user.created",
            "data": { "id": "user_new", "email_addresses": [{ "email_address": "new@example.com" }] }
        }).to_string();

        let req = test::TestRequest::post().uri("/v1/webhooks/identity")
            .insert_header(("X-Webhook-Signature", "sha256=00"))
            .set_payload(payload.clone()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
        assert!(store.get_user_by_external_id("user_new").await.unwrap().is_none());

        let req = test::TestRequest::post().uri("/v1/webhooks/identity")
            .insert_header(("X-Webhook-Signature", sign(payload.as_bytes())))
            .set_payload(payload).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let user = store.get_user_by_external_id("user_new").await.unwrap().unwrap();
        assert!(!user.is_approved);
    }

    #[actix_web::test]
    async fn unknown_routes_and_bad_ids_are_404() {
        let (data, _store) = setup().await;
        let app = service!(data);

        let req = test::TestRequest::get().uri("/v1/nothing").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        let req = test::TestRequest::get().uri("/v1/resources/abc").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
