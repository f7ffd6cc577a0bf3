use seqgen_core::{generate, read, Config};
use std::env;
use std::fs;

fn main() {
    let args: Vec<String> = env::args().collect();
    let input_file = args.get(1).expect("Usage: gen_layout <input.seq> [--threads]");
    let config = Config::default().with_multi_thread(args.iter().any(|a| a == "--threads"));

    let input = fs::read_to_string(input_file).expect("Failed to read input file");
    let records = read(&input).expect("Failed to read records");
    let diagram = match generate(&records, &config) {
        Ok(diagram) => diagram,
        Err(failure) => {
            eprintln!("{}", failure);
            eprintln!("{}", failure.partial.dump());
            std::process::exit(1);
        }
    };

    for message in diagram.messages() {
        let name = |id: Option<seqgen_core::LifelineId>| {
            id.map(|id| diagram.lifeline(id).name.clone()).unwrap_or_default()
        };
        println!(
            "{:>6.1}  {:<8} -> {:<8} {:?} {}",
            message.y,
            name(message.caller),
            name(message.callee),
            message.kind,
            message.text
        );
    }

    let layout = diagram.layout().expect("Diagram is finished");
    println!("{}", serde_json::to_string_pretty(&layout).expect("Layout serializes"));
}
