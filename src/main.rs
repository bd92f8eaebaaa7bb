use histlab::app::HistLabApp;
use histlab::controller::DisplayController;
use histlab::settings::AppSettings;
use histlab::{cli, log_err, log_info, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS { 0 } else { 1 });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();
    log_info!("[Settings] {:?}", settings);

    let controller = match DisplayController::from_settings(&settings) {
        Ok(c) => c,
        Err(e) => {
            log_err!("Startup failed: {}", e);
            eprintln!("HistLab: {}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 820.0])
            .with_min_inner_size([480.0, 400.0])
            .with_title("HistLab"),
        ..Default::default()
    };

    eframe::run_native(
        "HistLab",
        options,
        Box::new(move |cc| Box::new(HistLabApp::new(cc, controller, &settings))),
    )
}
