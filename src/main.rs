mod core;
mod gui;
mod video;

use eframe::egui;
use gui::PreviewHelperApp;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_title("Preview Helper - Video Frame Previewer"),
        ..Default::default()
    };

    eframe::run_native(
        "Preview Helper",
        options,
        Box::new(|cc| {
            match PreviewHelperApp::new(cc) {
                Ok(app) => Ok(Box::new(app)),
                Err(e) => {
                    eprintln!("Failed to initialize app: {}", e);
                    std::process::exit(1);
                }
            }
        }),
    ).map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
