use elastic_etl_rs::error::EtlError;

#[tokio::main]
async fn main() {
    if let Err(e) = elastic_etl_rs::run().await {
        match e.downcast_ref::<EtlError>() {
            Some(err) if err.is_fatal() => {
                log::error!("Run aborted before processing indices: {}", err)
            }
            _ => log::error!("Critical error during the ETL run: {:#}", e),
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
