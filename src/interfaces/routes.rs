use actix_web::web;

use crate::handlers::home::home;
use crate::handlers::system::health_check;

mod documents;
mod images;
mod json_error;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);
    cfg.service(health_check);

    cfg.service(
        web::scope("/api")
            .configure(images::config_routes)
            .configure(documents::config_routes)
    );

    cfg.configure(json_error::config_routes);
}
