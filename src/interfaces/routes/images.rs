use actix_web::web;
use crate::handlers::images;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .service(
                web::resource("")
                    .route(web::post().to(images::upload_image))
            )
            .service(
                web::resource("/{slug}")
                    .route(web::get().to(images::get_image))
            )
            .service(
                web::resource("/{slug}/{variant}")
                    .route(web::get().to(images::get_image_variant))
            )
    );
}
