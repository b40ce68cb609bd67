use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    vqa_annotator::cli_apps::run_annotate_cli(std::env::args().skip(1))
}
