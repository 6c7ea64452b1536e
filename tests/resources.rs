mod common;

#[cfg(test)]
mod tests {
    use crate::common::{sample_input, Fixture};
    use eduresource_server::resource::service::BulkUpdateItem;
    use eduresource_server::resource::types::resource::{ResourceInput, ResourcePatch, ResourceQuery};
    use eduresource_server::shared::types::account::Role;
    use eduresource_server::shared::types::app::ApiError;
    use eduresource_server::shared::util::config::LimitsConfig;
    use eduresource_server::resource::util::handler::ResourceStore;
    use eduresource_server::shared::util::handler::UserStore;

    fn retitle(title: &str) -> ResourcePatch {
        ResourcePatch { title: Some(title.to_string()), ..Default::default() }
    }

    #[actix_web::test]
    async fn initial_approval_depends_on_creator() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;

        let by_admin = f.resources.create(sample_input("X"), Some(&admin)).await.unwrap();
        let by_root = f.resources.create(sample_input("X"), Some(&root)).await.unwrap();
        let seeded = f.resources.create(sample_input("X"), None).await.unwrap();

        assert!(!by_admin.is_approved, "admin content starts pending");
        assert_eq!(by_admin.owner_user_id, Some(admin.id));
        assert!(by_root.is_approved, "super admin content is approved at once");
        assert!(seeded.is_approved, "seeded content is approved");
        assert_eq!(seeded.owner_user_id, None);
    }

    #[actix_web::test]
    async fn owner_edit_resets_approval_super_admin_edit_keeps_it() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;

        let created = f.resources.create(sample_input("Counting"), Some(&admin)).await.unwrap();
        let approved = f.resources.approve(created.id, &root).await.unwrap();
        assert!(approved.is_approved);

        let edited = f.resources.update(created.id, retitle("Counting bears"), &admin).await.unwrap();
        assert!(!edited.is_approved, "owner edit sends it back to moderation");
        assert_eq!(edited.title, "Counting bears");
        assert_eq!(edited.owner_user_id, Some(admin.id), "owner is kept");

        f.resources.approve(created.id, &root).await.unwrap();
        let edited = f.resources.update(created.id, retitle("Counting frogs"), &root).await.unwrap();
        assert!(edited.is_approved, "super admin edit stays approved");
        assert_eq!(edited.owner_user_id, Some(admin.id), "super admin edit does not take ownership");
    }

    #[actix_web::test]
    async fn approve_is_idempotent() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;
        let created = f.resources.create(sample_input("X"), Some(&admin)).await.unwrap();

        assert!(f.resources.approve(created.id, &root).await.unwrap().is_approved);
        assert!(f.resources.approve(created.id, &root).await.unwrap().is_approved, "second approve succeeds");
    }

    #[actix_web::test]
    async fn reject_removes_pending_resource() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;
        let created = f.resources.create(sample_input("X"), Some(&admin)).await.unwrap();

        let removed = f.resources.reject(created.id, &root).await.unwrap();
        assert_eq!(removed.id, created.id);
        assert!(matches!(f.resources.get_by_id(created.id, Some(&root)).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.resources.reject(created.id, &root).await, Err(ApiError::NotFound(_))));
    }

    #[actix_web::test]
    async fn reject_of_approved_resource_is_invalid_state() {
        let f = Fixture::new();
        let root = f.user("root", Role::SuperAdmin, true).await;
        let created = f.resources.create(sample_input("X"), Some(&root)).await.unwrap();

        assert!(matches!(f.resources.reject(created.id, &root).await, Err(ApiError::InvalidState(_))));
        assert!(f.resources.get_by_id(created.id, None).await.is_ok(), "still there");
    }

    #[actix_web::test]
    async fn plain_users_are_forbidden_even_as_owner() {
        let f = Fixture::new();
        let plain = f.user("plain", Role::User, true).await;
        let admin = f.user("admin", Role::Admin, true).await;
        let created = f.resources.create(sample_input("X"), Some(&admin)).await.unwrap();

        // Demote the owner so they own a resource as a plain user
        f.store.set_role(admin.id, Role::User).await.unwrap();
        let demoted = f.store.get_user(admin.id).await.unwrap().unwrap();

        for user in [&plain, &demoted] {
            assert!(matches!(f.resources.create(sample_input("Y"), Some(user)).await, Err(ApiError::Forbidden(_))));
            assert!(matches!(f.resources.update(created.id, retitle("Y"), user).await, Err(ApiError::Forbidden(_))));
            assert!(matches!(f.resources.delete(created.id, user).await, Err(ApiError::Forbidden(_))));
        }
    }

    #[actix_web::test]
    async fn admins_only_touch_their_own_resources() {
        let f = Fixture::new();
        let alice = f.user("alice", Role::Admin, true).await;
        let bob = f.user("bob", Role::Admin, true).await;
        let created = f.resources.create(sample_input("X"), Some(&alice)).await.unwrap();

        assert!(matches!(f.resources.update(created.id, retitle("Y"), &bob).await, Err(ApiError::Forbidden(_))));
        assert!(matches!(f.resources.delete(created.id, &bob).await, Err(ApiError::Forbidden(_))));
        assert!(f.resources.update(created.id, retitle("Y"), &alice).await.is_ok());
        assert!(f.resources.delete(created.id, &alice).await.is_ok());
    }

    #[actix_web::test]
    async fn unapproved_accounts_are_told_apart_from_forbidden() {
        let f = Fixture::new();
        let waiting = f.user("waiting", Role::Admin, false).await;
        assert!(matches!(f.resources.create(sample_input("X"), Some(&waiting)).await, Err(ApiError::Unapproved)));
    }

    #[actix_web::test]
    async fn unapproved_accounts_get_no_moderation_views() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let waiting_root = f.user("waiting_root", Role::SuperAdmin, false).await;
        let pending = f.resources.create(sample_input("X"), Some(&admin)).await.unwrap();

        assert!(matches!(f.resources.get_pending(&waiting_root).await, Err(ApiError::Unapproved)));
        assert!(matches!(f.resources.get_mine(&waiting_root).await, Err(ApiError::Unapproved)));
        assert!(matches!(f.resources.get_by_id(pending.id, Some(&waiting_root)).await, Err(ApiError::NotFound(_))),
            "pending content stays hidden");
        assert!(matches!(f.resources.approve(pending.id, &waiting_root).await, Err(ApiError::Unapproved)));
    }

    #[actix_web::test]
    async fn missing_and_out_of_range_fields_fail_validation() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;

        let mut input = sample_input("X");
        input.rating = Some(9);
        input.subject = None;
        match f.resources.create(input, Some(&admin)).await {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.has("rating"));
                assert!(errors.has("subject"));
            },
            other => panic!("expected validation error, got {other:?}")
        }
        assert!(matches!(f.resources.create(ResourceInput::default(), Some(&admin)).await,
            Err(ApiError::Validation(_))));
        assert!(f.resources.get_mine(&admin).await.unwrap().is_empty(), "nothing was written");
    }

    #[actix_web::test]
    async fn bulk_create_isolates_bad_items() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;

        let mut bad = sample_input("D");
        bad.rating = Some(9);
        let items = vec![Ok(sample_input("A")), Ok(sample_input("B")), Ok(bad), Ok(sample_input("C"))];

        let results = f.resources.bulk_create(items, &admin).await.unwrap();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
        assert!(matches!(results[2], Err(ApiError::Validation(_))), "the fourth item is reported in place");

        let mine = f.resources.get_mine(&admin).await.unwrap();
        let mut titles: Vec<&str> = mine.iter().map(|r| r.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[actix_web::test]
    async fn bulk_update_reports_missing_ids_without_aborting() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let other = f.user("other", Role::Admin, true).await;
        let mine = f.resources.create(sample_input("Mine"), Some(&admin)).await.unwrap();
        let theirs = f.resources.create(sample_input("Theirs"), Some(&other)).await.unwrap();

        let items = vec![
            Ok(BulkUpdateItem { id: 9999, patch: retitle("Ghost") }),
            Ok(BulkUpdateItem { id: theirs.id, patch: retitle("Stolen") }),
            Ok(BulkUpdateItem { id: mine.id, patch: retitle("Mine, edited") })
        ];
        let results = f.resources.bulk_update(items, &admin).await.unwrap();
        assert!(matches!(results[0], Err(ApiError::NotFound(_))));
        assert!(matches!(results[1], Err(ApiError::Forbidden(_))));
        assert_eq!(results[2].as_ref().unwrap().title, "Mine, edited");
    }

    #[actix_web::test]
    async fn bulk_delete_follows_single_delete_rules() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let other = f.user("other", Role::Admin, true).await;
        let mine = f.resources.create(sample_input("Mine"), Some(&admin)).await.unwrap();
        let theirs = f.resources.create(sample_input("Theirs"), Some(&other)).await.unwrap();

        let results = f.resources.bulk_delete(vec![mine.id, theirs.id], &admin).await.unwrap();
        assert_eq!(*results[0].as_ref().unwrap(), mine.id);
        assert!(matches!(results[1], Err(ApiError::Forbidden(_))));
        assert_eq!(f.resources.get_mine(&other).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn oversized_batches_are_rejected_up_front() {
        let f = Fixture::with_limits(LimitsConfig { max_bulk_items: 2, ..LimitsConfig::default() });
        let admin = f.user("admin", Role::Admin, true).await;
        let items = (0..3).map(|i| Ok(sample_input(&format!("T{i}")))).collect();

        assert!(matches!(f.resources.bulk_create(items, &admin).await, Err(ApiError::Validation(_))));
        assert!(f.resources.get_mine(&admin).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn public_listing_only_shows_approved_resources() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;
        f.resources.create(sample_input("Pending"), Some(&admin)).await.unwrap();
        f.resources.create(sample_input("Public"), Some(&root)).await.unwrap();
        f.resources.create(sample_input("Seeded"), None).await.unwrap();

        let listed = f.resources.get_all(ResourceQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.is_approved));
    }

    #[actix_web::test]
    async fn listing_filters_and_pages() {
        let f = Fixture::new();
        let mut science = sample_input("Volcano");
        science.subject = Some("Science".to_string());
        science.event_date = Some("2024-06-01".to_string());
        f.resources.create(science, None).await.unwrap();
        f.resources.create(sample_input("Counting bears"), None).await.unwrap();
        f.resources.create(sample_input("Shapes"), None).await.unwrap();

        let by_subject = f.resources.get_all(ResourceQuery { subject: Some("Science".to_string()), ..Default::default() })
            .await.unwrap();
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].title, "Volcano");

        let by_text = f.resources.get_all(ResourceQuery { q: Some("bears".to_string()), ..Default::default() })
            .await.unwrap();
        assert_eq!(by_text.len(), 1);

        let page = f.resources.get_all(ResourceQuery { limit: Some(2), ..Default::default() }).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|r| r.title != "Volcano"), "older event dates come last");
    }

    #[actix_web::test]
    async fn text_search_is_literal_and_sees_through_sanitizing() {
        let f = Fixture::new();
        let mut fish = sample_input("Lunch");
        fish.description = Some("Fish & chips, 3 < 4".to_string());
        f.resources.create(fish, None).await.unwrap();
        f.resources.create(sample_input("Shapes"), None).await.unwrap();

        let search = |q: &str| ResourceQuery { q: Some(q.to_string()), ..Default::default() };
        assert_eq!(f.resources.get_all(search("Fish & chips")).await.unwrap().len(), 1);
        assert_eq!(f.resources.get_all(search("3 < 4")).await.unwrap().len(), 1);
        assert!(f.resources.get_all(search("_")).await.unwrap().is_empty(), "no wildcard matching");
        assert!(f.resources.get_all(search("%")).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn guarded_delete_leaves_approved_content() {
        let f = Fixture::new();
        let admin = f.user("admin", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;
        let created = f.resources.create(sample_input("X"), Some(&admin)).await.unwrap();

        // An approval that lands between a reject's load and its delete
        f.resources.approve(created.id, &root).await.unwrap();
        assert_eq!(f.store.delete_pending_resource(created.id).await.unwrap(), false);
        assert!(f.store.get_resource(created.id).await.unwrap().unwrap().is_approved);

        let pending = f.resources.create(sample_input("Y"), Some(&admin)).await.unwrap();
        assert!(f.store.delete_pending_resource(pending.id).await.unwrap());
        assert!(matches!(f.store.delete_pending_resource(pending.id).await, Err(_)));
    }

    #[actix_web::test]
    async fn pending_visibility() {
        let f = Fixture::new();
        let alice = f.user("alice", Role::Admin, true).await;
        let bob = f.user("bob", Role::Admin, true).await;
        let root = f.user("root", Role::SuperAdmin, true).await;
        let pending = f.resources.create(sample_input("X"), Some(&alice)).await.unwrap();

        assert!(f.resources.get_by_id(pending.id, Some(&alice)).await.is_ok(), "owner sees it");
        assert!(f.resources.get_by_id(pending.id, Some(&root)).await.is_ok(), "super admin sees it");
        assert!(matches!(f.resources.get_by_id(pending.id, Some(&bob)).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.resources.get_by_id(pending.id, None).await, Err(ApiError::NotFound(_))));

        assert_eq!(f.resources.get_pending(&root).await.unwrap().len(), 1);
        assert!(matches!(f.resources.get_pending(&alice).await, Err(ApiError::Forbidden(_))));
        assert_eq!(f.resources.get_mine(&alice).await.unwrap().len(), 1);
        assert!(f.resources.get_mine(&bob).await.unwrap().is_empty());
    }
}
