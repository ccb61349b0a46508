//! Parse command - mine one routing instruction.

use clap::Args;
use console::style;

use navcast::guidance::{format_prompt, GuidanceMessage};
use navcast::instruction;
use navcast::transport::encode;

use crate::error::CliError;

/// Arguments for the parse command.
#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Instruction text, e.g. "沿<b>长安路</b>行驶200米，右转进入<b>大雁塔南路</b>"
    pub instruction: String,

    /// Distance shown when the text carries none, e.g. "85米"
    #[arg(long)]
    pub distance: Option<String>,

    /// Print the datagram payload instead of the field list
    #[arg(long)]
    pub json: bool,
}

/// Run the parse command.
pub fn run(args: ParseArgs) -> Result<(), CliError> {
    let message = parse_message(&args.instruction, args.distance.as_deref());

    if args.json {
        let payload = encode(&message).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        println!("{}", String::from_utf8_lossy(&payload));
        return Ok(());
    }

    println!("{}", style("Parsed instruction").bold().underlined());
    println!("  Text:         {}", instruction::strip_markup(&args.instruction));
    println!("  Turn:         {} (icon {})", message.turn, message.icon_code);
    println!("  Distance:     {}", message.distance_text);
    println!("  Current road: {}", message.current_road);
    if message.next_road.is_empty() {
        println!("  Next road:    (none)");
    } else {
        println!("  Next road:    {}", message.next_road);
    }
    println!("  Prompt:       {}", format_prompt(&message));
    Ok(())
}

fn parse_message(text: &str, distance: Option<&str>) -> GuidanceMessage {
    instruction::parse(text, distance).into_message(&GuidanceMessage::default())
}
