use isbridge_frame::{decode_frame, decode_sentence};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, print_sentence, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = args.input.trim();

    if args.ascii {
        let sentence = decode_sentence(input.as_bytes())
            .map_err(|err| frame_error("invalid sentence", err))?;
        print_sentence(&sentence, format);
        return Ok(SUCCESS);
    }

    let wire = parse_hex(input)?;
    let decoded = decode_frame(&wire).map_err(|err| frame_error("invalid frame", err))?;
    print_frame(&decoded.to_frame(), "input", format);
    Ok(SUCCESS)
}

/// Accepts contiguous or whitespace-separated hex, as printed by `encode`.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.split_whitespace().collect();
    hex::decode(&compact).map_err(|err| CliError::new(USAGE, format!("input is not valid hex: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_may_be_spaced() {
        assert_eq!(parse_hex("ef 49 01").unwrap(), vec![0xEF, 0x49, 0x01]);
        assert_eq!(parse_hex("EF4901").unwrap(), vec![0xEF, 0x49, 0x01]);
        assert_eq!(parse_hex("e").unwrap_err().code, USAGE);
    }

    #[test]
    fn corrupt_frame_is_invalid_data() {
        let args = DecodeArgs {
            input: "ef49040300000000ffff".to_string(),
            ascii: false,
        };
        let err = run(args, OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }

    #[test]
    fn bad_sentence_checksum_is_invalid_data() {
        let args = DecodeArgs {
            input: "$ASCB*00".to_string(),
            ascii: true,
        };
        let err = run(args, OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }
}
