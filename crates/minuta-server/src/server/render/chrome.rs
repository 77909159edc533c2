//! Headless-Chromium rendering engine.
//!
//! Each [`ChromeEngine`] wraps one Chromium process driven over the DevTools
//! protocol. A render loads the resolved document body as a `data:` URL in a
//! fresh tab, waits (bounded) for navigation to settle, and exports a single
//! PDF with the deployment's fixed page geometry.

use crate::server::config::{PdfSettings, ServerConfig};
use crate::server::pool::instance::{EngineError, EngineLauncher, RenderEngine};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Launches headless Chromium processes for the pool.
pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
    quiescence_timeout: Duration,
    engine_idle_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            quiescence_timeout: config.quiescence_timeout,
            // Chromium carries its own idle kill switch; keep it comfortably
            // past the pool's retirement so the pool, not the browser,
            // decides instance lifetime.
            engine_idle_timeout: config.pool.idle_ttl
                + config.render_timeout
                + Duration::from_secs(60),
        }
    }
}

impl EngineLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
        let mut builder = LaunchOptions::default_builder();
        builder
            .headless(true)
            .sandbox(false)
            .idle_browser_timeout(self.engine_idle_timeout);
        if let Some(path) = &self.chrome_path {
            builder.path(Some(path.clone()));
        }
        let options = builder
            .build()
            .map_err(|err| EngineError::Launch(err.to_string()))?;
        let browser = Browser::new(options).map_err(|err| EngineError::Launch(err.to_string()))?;
        Ok(Box::new(ChromeEngine {
            browser,
            quiescence_timeout: self.quiescence_timeout,
        }))
    }
}

/// One Chromium process. Dropping it tears the external process down.
pub struct ChromeEngine {
    browser: Browser,
    quiescence_timeout: Duration,
}

impl ChromeEngine {
    fn pdf_options(settings: &PdfSettings) -> PrintToPdfOptions {
        PrintToPdfOptions {
            print_background: Some(settings.print_background),
            paper_width: Some(settings.paper_width_in),
            paper_height: Some(settings.paper_height_in),
            margin_top: Some(settings.margin_in),
            margin_bottom: Some(settings.margin_in),
            margin_left: Some(settings.margin_in),
            margin_right: Some(settings.margin_in),
            ..Default::default()
        }
    }
}

impl RenderEngine for ChromeEngine {
    fn ping(&self) -> bool {
        self.browser.get_version().is_ok()
    }

    fn render_pdf(&self, body: &str, settings: &PdfSettings) -> Result<Vec<u8>, EngineError> {
        let started = Instant::now();
        let tab = self
            .browser
            .new_tab()
            .map_err(|err| EngineError::Unresponsive(err.to_string()))?;
        tab.set_default_timeout(self.quiescence_timeout);

        // A data URL keeps the load self-contained: no temp files, no local
        // web server, and navigation settles once embedded resources resolve.
        let url = format!(
            "data:text/html;charset=utf-8;base64,{}",
            STANDARD.encode(body)
        );
        let loaded = tab
            .navigate_to(&url)
            .and_then(|tab| tab.wait_until_navigated());
        if let Err(err) = loaded {
            let _ = tab.close(true);
            // The navigation wait is the only bounded step of the load;
            // distinguish that bound expiring from the engine dying under us.
            return Err(if started.elapsed() >= self.quiescence_timeout {
                EngineError::Quiescence(self.quiescence_timeout)
            } else {
                EngineError::Unresponsive(err.to_string())
            });
        }

        let pdf = tab.print_to_pdf(Some(Self::pdf_options(settings)));
        let _ = tab.close(true);
        pdf.map_err(|err| EngineError::Export(err.to_string()))
    }
}
