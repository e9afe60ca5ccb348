use ledgerchat::logging::{backend_info, init_logging};
use ledgerchat::server::serve;
use ledgerchat::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A local .env is optional; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    init_logging();

    let settings = Settings::from_env().map_err(|e| anyhow::anyhow!(e))?;
    backend_info(format!(
        "Starting ledgerchat (model='{}', db='{}')",
        settings.model, settings.db_path
    ));
    if !settings.ocr_configured() {
        backend_info("Clova OCR credentials not set; /parse-receipt will refuse uploads");
    }

    serve(settings).await
}
