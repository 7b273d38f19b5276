//! Integration tests for the cards API, including multipart media uploads

use nfc_cards::models::{card_contact, card_image, card_introduction, card_video};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::{Value, json};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{API, FormPart, TestApp, json_request, multipart_request, spawn_app};

async fn create_card(app: &TestApp, token: &str, parts: Vec<FormPart>) -> (u16, Value) {
    app.call(multipart_request("POST", &format!("{API}/cards"), token, parts))
        .await
        .unwrap()
}

fn contacts_json() -> String {
    json!([
        { "type": "phone", "value": "+84 900 000 000", "is_primary": true },
        { "type": "email", "value": "jane@acme.com" }
    ])
    .to_string()
}

#[tokio::test]
async fn create_card_with_relations() {
    let app = spawn_app().await.unwrap();
    let (user_id, token) = app.register("jane@example.com", None).await.unwrap();
    let company_id = app.create_company(&token, "Acme").await.unwrap();

    let (status, body) = create_card(
        &app,
        &token,
        vec![
            FormPart::text("name", "Jane Doe"),
            FormPart::text("title", "Engineer"),
            FormPart::text("company_id", company_id.to_string()),
            FormPart::text("color_scheme", r##"{"primary":"#000000","secondary":"#ffffff"}"##),
            FormPart::text("custom_fields", r#"{"team":"platform"}"#),
            FormPart::text("contacts", contacts_json()),
            FormPart::text("gallery", "https://img.example.com/a.jpg"),
            FormPart::text("gallery", "https://img.example.com/b.jpg"),
        ],
    )
    .await;
    assert_eq!(status, 201, "{body}");

    let card = &body["data"];
    assert_eq!(card["name"], "Jane Doe");
    assert_eq!(card["user_id"], user_id);
    assert_eq!(card["user"]["email"], "jane@example.com");
    assert_eq!(card["company"]["name"], "Acme");
    assert_eq!(card["status"], "active");
    assert_eq!(card["is_private"], false);
    assert_eq!(card["max_version"], 1);
    assert_eq!(card["view_count"], 0);
    assert_eq!(card["custom_fields"]["team"], "platform");
    assert_eq!(card["contacts"].as_array().unwrap().len(), 2);
    assert_eq!(card["contacts"][0]["type"], "phone");
    assert_eq!(card["contacts"][0]["is_primary"], true);
    assert_eq!(card["images"][0]["image_url"], "https://img.example.com/a.jpg");
    assert_eq!(card["images"][0]["display_order"], 0);
    assert_eq!(card["images"][1]["display_order"], 1);
    assert_eq!(app.uploader.count(), 0);

    let id = card["id"].as_i64().unwrap();
    let (status, body) = app
        .call(json_request("GET", &format!("{API}/cards/{id}"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["title"], "Engineer");
}

#[tokio::test]
async fn create_card_validates_fields() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let cases = vec![
        vec![FormPart::text("title", "No name")],
        vec![FormPart::text("name", "x".repeat(51))],
        vec![
            FormPart::text("name", "Bad contact"),
            FormPart::text("contacts", r#"[{"type":"pager","value":"1"}]"#),
        ],
        vec![
            FormPart::text("name", "Bad json"),
            FormPart::text("custom_fields", "{oops"),
        ],
        vec![
            FormPart::text("name", "Ghost company"),
            FormPart::text("company_id", "999"),
        ],
        vec![
            FormPart::text("name", "Bad avatar"),
            FormPart::text("avatar", "ftp://nope"),
        ],
    ];

    for parts in cases {
        let (status, body) = create_card(&app, &token, parts).await;
        assert_eq!(status, 400, "{body}");
    }

    let (_, body) = app
        .call(json_request("GET", &format!("{API}/cards"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(body["total"], 0);
    assert_eq!(body["message"], "No cards found");
}

#[tokio::test]
async fn uploaded_files_land_in_card_folders() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let (status, body) = create_card(
        &app,
        &token,
        vec![
            FormPart::text("name", "With media"),
            FormPart::text("avatar", "https://ignored.example.com/a.png"),
            FormPart::file("avatar", "face.png"),
            FormPart::file("logo", "logo.png"),
        ],
    )
    .await;
    assert_eq!(status, 201, "{body}");

    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(
        body["data"]["avatar"],
        format!("https://media.test/nfc_cards/{id}/avatar/face.png")
    );
    assert_eq!(
        body["data"]["logo"],
        format!("https://media.test/nfc_cards/{id}/logo/logo.png")
    );
    assert!(body["data"]["background"].is_null());

    let mut folders = app.uploader.folders();
    folders.sort();
    assert_eq!(
        folders,
        vec![
            format!("nfc_cards/{id}/avatar"),
            format!("nfc_cards/{id}/logo"),
        ]
    );
}

#[tokio::test]
async fn only_first_fifteen_gallery_files_are_uploaded() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let mut parts = vec![FormPart::text("name", "Gallery")];
    parts.extend((0..16).map(|i| FormPart::file("gallery", format!("g{i:02}.png"))));

    let (status, body) = create_card(&app, &token, parts).await;
    assert_eq!(status, 201, "{body}");

    let images = body["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 15);
    assert_eq!(app.uploader.count(), 15);
    assert!(images[0]["image_url"].as_str().unwrap().ends_with("/gallery/g00.png"));
    assert!(images[14]["image_url"].as_str().unwrap().ends_with("/gallery/g14.png"));
}

#[tokio::test]
async fn update_replaces_contacts_only_when_provided() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let (_, body) = create_card(
        &app,
        &token,
        vec![
            FormPart::text("name", "Jane"),
            FormPart::text("contacts", contacts_json()),
            FormPart::text("gallery", "https://img.example.com/a.jpg"),
        ],
    )
    .await;
    let id = body["data"]["id"].as_i64().unwrap();
    let old_ids: Vec<i64> = body["data"]["contacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|contact| contact["id"].as_i64().unwrap())
        .collect();

    let (status, body) = app
        .call(multipart_request(
            "PATCH",
            &format!("{API}/cards/{id}"),
            &token,
            vec![FormPart::text("title", "Lead")],
        ))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"]["title"], "Lead");
    assert_eq!(body["data"]["contacts"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["images"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .call(multipart_request(
            "PATCH",
            &format!("{API}/cards/{id}"),
            &token,
            vec![FormPart::text(
                "contacts",
                r#"[{"type":"linkedin","value":"in/jane"}]"#,
            )],
        ))
        .await
        .unwrap();
    assert_eq!(status, 200);

    let contacts = body["data"]["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0]["type"], "linkedin");
    assert!(!old_ids.contains(&contacts[0]["id"].as_i64().unwrap()));

    let stored = card_contact::Entity::find()
        .filter(card_contact::Column::CardId.eq(id as i32))
        .count(&app.db)
        .await
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn update_missing_card_is_404_before_upload() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let (status, body) = app
        .call(multipart_request(
            "PATCH",
            &format!("{API}/cards/777"),
            &token,
            vec![FormPart::file("avatar", "face.png")],
        ))
        .await
        .unwrap();
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Card with ID 777 not found");
    assert_eq!(app.uploader.count(), 0);
}

#[tokio::test]
async fn delete_card_removes_children() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let (_, body) = create_card(
        &app,
        &token,
        vec![
            FormPart::text("name", "Doomed"),
            FormPart::text("contacts", contacts_json()),
            FormPart::text("gallery", "https://img.example.com/a.jpg"),
        ],
    )
    .await;
    let id = body["data"]["id"].as_i64().unwrap() as i32;

    card_introduction::ActiveModel {
        card_id: Set(id),
        company_name: Set(Some("Acme".to_string())),
        description: Set(None),
        ..Default::default()
    }
    .insert(&app.db)
    .await
    .unwrap();
    card_video::ActiveModel {
        card_id: Set(id),
        youtube_link: Set("https://youtu.be/xyz".to_string()),
        autoplay: Set(false),
        display_order: Set(0),
        ..Default::default()
    }
    .insert(&app.db)
    .await
    .unwrap();

    let (status, body) = app
        .call(json_request("DELETE", &format!("{API}/cards/{id}"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["data"], format!("Card with ID {id} has been deleted"));

    assert_eq!(card_contact::Entity::find().count(&app.db).await.unwrap(), 0);
    assert_eq!(card_image::Entity::find().count(&app.db).await.unwrap(), 0);
    assert_eq!(card_introduction::Entity::find().count(&app.db).await.unwrap(), 0);
    assert_eq!(card_video::Entity::find().count(&app.db).await.unwrap(), 0);

    let (status, _) = app
        .call(json_request("DELETE", &format!("{API}/cards/{id}"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(status, 404);
}

#[tokio::test]
async fn list_cards_filters_exactly_on_status() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    for (name, status) in [("Alice", "active"), ("Bob", "inactive"), ("Alina", "active")] {
        let (code, _) = create_card(
            &app,
            &token,
            vec![FormPart::text("name", name), FormPart::text("status", status)],
        )
        .await;
        assert_eq!(code, 201);
    }

    let (status, body) = app
        .call(json_request(
            "GET",
            &format!("{API}/cards?status=active&sort=-name"),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["name"], "Alina");
    assert_eq!(body["data"][1]["name"], "Alice");

    let (_, body) = app
        .call(json_request(
            "GET",
            &format!("{API}/cards?name=li&fields=id,name"),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0].as_object().unwrap().len(), 2);

    let (status, _) = app
        .call(json_request(
            "GET",
            &format!("{API}/cards?status=archived"),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(status, 400);
}

#[tokio::test]
async fn list_cards_paginates_and_rejects_bad_pages() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    for name in ["Delta", "Alpha", "Charlie", "Bravo", "Echo"] {
        let (code, _) = create_card(&app, &token, vec![FormPart::text("name", name)]).await;
        assert_eq!(code, 201);
    }

    let (status, body) = app
        .call(json_request(
            "GET",
            &format!("{API}/cards?sort=name&page=2&limit=2"),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["total"], 5);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Charlie", "Delta"]);

    let (_, body) = app
        .call(json_request(
            "GET",
            &format!("{API}/cards?sort=-name&page=3&limit=2"),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "Alpha");

    for query in ["page=0", "limit=0", "page=9223372036854775807&limit=2"] {
        let (status, body) = app
            .call(json_request(
                "GET",
                &format!("{API}/cards?{query}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(status, 400, "query {query} -> {body}");
    }
}

#[tokio::test]
async fn card_endpoints_require_multipart_and_auth() {
    let app = spawn_app().await.unwrap();
    let (_, token) = app.register("jane@example.com", None).await.unwrap();

    let (status, _) = app
        .call(json_request(
            "POST",
            &format!("{API}/cards"),
            Some(&token),
            Some(json!({ "name": "json" })),
        ))
        .await
        .unwrap();
    assert_eq!(status, 400);

    let (status, _) = app
        .call(json_request("GET", &format!("{API}/cards"), None, None))
        .await
        .unwrap();
    assert_eq!(status, 401);
}
