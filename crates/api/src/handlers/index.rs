use actix_web::HttpResponse;

pub async fn index_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(format!("monobank-exporter {}", env!("CARGO_PKG_VERSION")))
}
