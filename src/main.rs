use std::env;

use stardict_reader::{Dictionary, DEFAULT_PROGRESS_WINDOW};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-ifo-file> [word]", args[0]);
        eprintln!("       {} <path-to-ifo-file> --suggest <prefix>", args[0]);
        std::process::exit(1);
    }

    let ifo_path = &args[1];
    println!("Opening dictionary: {}", ifo_path);
    println!("{}", "=".repeat(60));

    let dictionary = match Dictionary::open(ifo_path) {
        Ok(dictionary) => dictionary,
        Err(e) => {
            eprintln!("ERROR: Failed to open dictionary");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let metadata = dictionary.metadata();
    println!("\nDictionary Information:");
    println!("  Title: {}", metadata.book_name);
    println!("  Entries: {}", metadata.word_count);
    println!("  Offset width: {} bits", metadata.idx_offset_bits.field_width() * 8);
    if let Some(version) = &metadata.version {
        println!("  Version: {}", version);
    }
    if let Some(author) = &metadata.author {
        println!("  Author: {}", author);
    }
    if let Some(description) = &metadata.description {
        println!("  Description: {}", description);
    }

    if !dictionary.has_ordinal_index() {
        println!("\nNo ordinal index yet, building one...");
        let result = dictionary.build_ordinal_index(DEFAULT_PROGRESS_WINDOW, |done, total| {
            println!("  indexed {} of {}", done, total);
        });
        if let Err(e) = result {
            eprintln!("ERROR: Failed to build the ordinal index");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }

    match args.get(2).map(String::as_str) {
        Some("--suggest") => {
            let Some(prefix) = args.get(3) else {
                eprintln!("ERROR: --suggest requires a prefix argument.");
                std::process::exit(1);
            };
            match dictionary.suggestions(prefix) {
                Ok(entries) if entries.is_empty() => println!("\nNo suggestions for `{}`.", prefix),
                Ok(entries) => {
                    println!("\nSuggestions for `{}`:", prefix);
                    for (i, entry) in entries.iter().enumerate() {
                        println!("  {}. {}", i + 1, entry.lemma());
                    }
                }
                Err(e) => {
                    eprintln!("ERROR: Suggestion search failed");
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(word) => match dictionary.definitions(word) {
            Ok(Some(definitions)) => {
                println!("\n{}", word);
                println!("{}", "-".repeat(60));
                println!("{}", definitions);
            }
            Ok(None) => println!("\n`{}` was not found.", word),
            Err(e) => {
                eprintln!("ERROR: Lookup failed");
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        },
        None => {}
    }
}
