use clap::Parser;
use std::path::PathBuf;
use time::OffsetDateTime;

use proposal_export::{
    error::ContextError, ExportConfiguration, ExportFormat, ExportRecord, Exporter,
    ProposalExportRequest,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArguments {
    #[arg(short = 'r', long = "request", value_name = "json_file")]
    request_path: PathBuf,
    #[arg(short = 'f', long = "format", value_name = "PDF|DOCX", default_value = "PDF")]
    format: String,
    #[arg(short = 'c', long = "configuration", value_name = "json_file")]
    configuration_path: Option<PathBuf>,
    #[arg(
        short = 'o',
        long = "output-directory",
        value_name = "directory",
        default_value = "."
    )]
    output_directory: PathBuf,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let arguments = CliArguments::parse();
    log::debug!("{:?}", arguments);

    let configuration = match &arguments.configuration_path {
        Some(configuration_path) => ExportConfiguration::from_path(configuration_path)?,
        None => ExportConfiguration::default(),
    };
    let request = ProposalExportRequest::from_path(&arguments.request_path)?;
    let format = arguments
        .format
        .parse::<ExportFormat>()
        .map_err(|error| ContextError::with_error("Invalid export format", &error))?;

    let generated_at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let export_result = match Exporter::new(configuration).export_at(&request, format, generated_at)
    {
        Ok(export_result) => export_result,
        Err(error) => {
            log_record(&ExportRecord::failed(&request.title, format, generated_at));
            return Err(ContextError::with_error(
                "Failed to export the proposal",
                &error,
            ));
        }
    };

    let output_file_path = arguments.output_directory.join(export_result.file_name());
    std::fs::write(&output_file_path, export_result.buffer()).map_err(|error| {
        ContextError::with_error(
            format!("Failed to write the output file {:?}", output_file_path),
            &error,
        )
    })?;
    log::info!(
        "Saved the {} export to the path: {:?}",
        export_result.content_type(),
        output_file_path
    );
    log_record(&export_result.record(generated_at));

    Ok(())
}

fn log_record(export_record: &ExportRecord) {
    match serde_json::to_string(export_record) {
        Ok(serialized_record) => log::info!("Export record: {}", serialized_record),
        Err(error) => log::warn!("Unable to serialize the export record: {}", error),
    }
}
