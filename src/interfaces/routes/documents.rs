use actix_web::web;
use crate::handlers::documents;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/documents")
            .service(
                web::resource("")
                    .route(web::post().to(documents::create_document))
            )
            .service(
                web::resource("/{document_id}")
                    .route(web::get().to(documents::get_document))
                    .route(web::put().to(documents::update_document))
                    .route(web::delete().to(documents::delete_document))
            )
    );
}
