mod test_utils;

use std::collections::HashSet;

use test_utils::*;

use catalog_backend::entities::document::DocumentContentRequest;
use catalog_backend::errors::AppError;
use uuid::Uuid;

fn body(html: impl Into<String>) -> DocumentContentRequest {
    DocumentContentRequest { html: html.into() }
}

/// Every /api/images/{slug} substring in the stored html must map onto
/// exactly one attached image, and vice versa.
fn assert_reference_invariant(html: &str, image_slugs: &[String]) {
    let mut cited: HashSet<&str> = HashSet::new();
    for chunk in html.split("src=\"/api/images/").skip(1) {
        cited.insert(chunk.split('"').next().unwrap());
    }
    let attached: HashSet<&str> = image_slugs.iter().map(|s| s.as_str()).collect();
    assert_eq!(cited, attached, "stored html and attached images diverge");
}

#[actix_rt::test]
async fn inline_image_is_extracted_and_servable() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(None, body(format!(r#"<p>Hello <img src="{}"></p>"#, png_data_uri(4, 4))))
        .await
        .unwrap();

    assert_eq!(doc.image_slugs.len(), 1);
    let slug = &doc.image_slugs[0];

    let html = doc.html.as_deref().unwrap();
    assert!(html.starts_with("<p>Hello "), "got: {html}");
    assert!(html.contains(&format!("/api/images/{slug}")));
    assert!(!html.contains("data:image"));

    let image = app.images.get_image_by_slug(slug).await.unwrap();
    assert_eq!(image.mime_type, "image/png");
    assert_eq!((image.width, image.height), (4, 4));
    assert_eq!(image.data, encoded_image(4, 4, image::ImageFormat::Png));
}

#[actix_rt::test]
async fn resubmitting_stored_html_is_idempotent() {
    let app = TestApp::spawn();

    let first = app
        .documents
        .ensure_document(None, body(format!(r#"<p>x <img src="{}"></p>"#, png_data_uri(3, 3))))
        .await
        .unwrap();

    // The editor round-trips the stored html on the next save.
    let second = app
        .documents
        .ensure_document(Some(first.id), body(first.html.clone().unwrap()))
        .await
        .unwrap();

    assert_eq!(second.html, first.html);
    let mut before = first.image_slugs.clone();
    let mut after = second.image_slugs.clone();
    before.sort();
    after.sort();
    assert_eq!(after, before);
    assert_eq!(app.repo.image_count(), 1);
}

#[actix_rt::test]
async fn plain_html_without_images_is_idempotent() {
    let app = TestApp::spawn();
    let html = "<p>No images <strong>here</strong></p>";

    let first = app.documents.ensure_document(None, body(html)).await.unwrap();
    let second = app
        .documents
        .ensure_document(Some(first.id), body(html))
        .await
        .unwrap();

    assert_eq!(second.html, first.html);
    assert!(second.image_slugs.is_empty());
}

#[actix_rt::test]
async fn orphaned_image_is_garbage_collected() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(
            None,
            body(format!(
                r#"<p><img src="{}"><img src="{}"></p>"#,
                png_data_uri(2, 2),
                png_data_uri(5, 5)
            )),
        )
        .await
        .unwrap();
    assert_eq!(doc.image_slugs.len(), 2);

    // slugs appear in the stored html in document order: 2x2 first, 5x5 second
    let html = doc.html.unwrap();
    let in_order: Vec<String> = html
        .split("src=\"/api/images/")
        .skip(1)
        .map(|chunk| chunk.split('"').next().unwrap().to_string())
        .collect();
    let (drop, keep) = (in_order[0].clone(), in_order[1].clone());

    // edit down to the one remaining reference
    let keep_src = format!(r#"<p><img src="/api/images/{keep}"></p>"#);
    let updated = app
        .documents
        .ensure_document(Some(doc.id), body(keep_src))
        .await
        .unwrap();

    assert_eq!(updated.image_slugs, vec![keep.clone()]);
    assert!(app.images.get_image_by_slug(&keep).await.is_ok());
    assert!(matches!(
        app.images.get_image_by_slug(&drop).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(app.repo.image_count(), 1);
}

#[actix_rt::test]
async fn removing_all_images_deletes_them() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(None, body(format!(r#"<p><img src="{}"></p>"#, png_data_uri(2, 2))))
        .await
        .unwrap();
    let slug = doc.image_slugs[0].clone();

    let updated = app
        .documents
        .ensure_document(Some(doc.id), body("<p>all gone</p>"))
        .await
        .unwrap();

    assert!(updated.image_slugs.is_empty());
    assert!(matches!(
        app.images.get_image_by_slug(&slug).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(app.repo.image_count(), 0);
}

#[actix_rt::test]
async fn reference_invariant_holds_across_edits() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(
            None,
            body(format!(
                r#"<p><img src="{}"> and <img src="{}"></p>"#,
                png_data_uri(2, 2),
                png_data_uri(3, 3)
            )),
        )
        .await
        .unwrap();
    assert_reference_invariant(doc.html.as_deref().unwrap(), &doc.image_slugs);

    let slug = doc.image_slugs[0].clone();
    let updated = app
        .documents
        .ensure_document(
            Some(doc.id),
            body(format!(
                r#"<p><img src="/api/images/{slug}"> plus <img src="{}"></p>"#,
                png_data_uri(7, 7)
            )),
        )
        .await
        .unwrap();
    assert_reference_invariant(updated.html.as_deref().unwrap(), &updated.image_slugs);
    assert_eq!(updated.image_slugs.len(), 2);
}

#[actix_rt::test]
async fn unsafe_markup_never_reaches_storage() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(
            None,
            body(r#"<p>ok</p><script>alert(1)</script><a href="javascript:x()" onclick="y()">link</a>"#),
        )
        .await
        .unwrap();

    let html = doc.html.unwrap();
    assert!(!html.contains("script"));
    assert!(!html.contains("javascript:"));
    assert!(!html.contains("onclick"));
    assert!(html.contains(r#"target="_blank""#));
    assert!(html.contains("noopener"));
}

#[actix_rt::test]
async fn deleting_document_cascades_to_images_and_variants() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(None, body(format!(r#"<p><img src="{}"></p>"#, png_data_uri(2, 2))))
        .await
        .unwrap();
    let slug = doc.image_slugs[0].clone();

    // generate a variant so the cascade has something to sweep
    let image = app.images.get_image_by_slug(&slug).await.unwrap();
    app.images
        .ensure_variant(&image, "thumbnail".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(app.repo.variant_count(), 1);

    app.documents.delete_document(&doc.id).await.unwrap();

    assert!(matches!(
        app.documents.get_document(&doc.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(app.repo.image_count(), 0);
    assert_eq!(app.repo.variant_count(), 0);
}

#[actix_rt::test]
async fn unknown_document_is_not_found() {
    let app = TestApp::spawn();
    assert!(matches!(
        app.documents.get_document(&Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
}

#[actix_rt::test]
async fn foreign_image_sources_are_not_managed() {
    let app = TestApp::spawn();

    let doc = app
        .documents
        .ensure_document(
            None,
            body(r#"<p><img src="https://elsewhere.example/x.png" alt="ext"></p>"#),
        )
        .await
        .unwrap();

    assert!(doc.image_slugs.is_empty());
    assert!(doc.html.unwrap().contains("https://elsewhere.example/x.png"));
}
