//! Parsing of the `--pairs` argument

use anyhow::anyhow;

/// Splits `src1:dst1,src2:dst2,...` into transfer requests, each capped to `bandwidth_kb`.
///
/// Every pair must contain exactly one `:` with a non-empty path on both sides.
pub fn parse_pairs(pairs: &str, bandwidth_kb: u64) -> anyhow::Result<Vec<common::TransferRequest>> {
    pairs
        .split(',')
        .map(|pair| {
            let parts = pair.split(':').collect::<Vec<_>>();
            match parts.as_slice() {
                [src, dst] if !src.is_empty() && !dst.is_empty() => {
                    Ok(common::TransferRequest::new(*src, *dst, bandwidth_kb))
                }
                _ => Err(anyhow!("Incorrect format of pair {:?}, use --help", pair)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pair() {
        let requests = parse_pairs("a:b", 5).unwrap();
        assert_eq!(requests, vec![common::TransferRequest::new("a", "b", 5)]);
    }

    #[test]
    fn many_pairs_keep_their_order() {
        let requests = parse_pairs("/x/src/:/y,file.txt:out/,dir:dst", 1).unwrap();
        assert_eq!(
            requests,
            vec![
                common::TransferRequest::new("/x/src/", "/y", 1),
                common::TransferRequest::new("file.txt", "out/", 1),
                common::TransferRequest::new("dir", "dst", 1),
            ]
        );
        // the trailing separator survives parsing
        assert!(common::path::has_trailing_separator(&requests[0].src));
    }

    #[test]
    fn missing_separator() {
        let error = parse_pairs("a:b,cd", 1).unwrap_err();
        assert_eq!(error.to_string(), r#"Incorrect format of pair "cd", use --help"#);
    }

    #[test]
    fn too_many_separators() {
        let error = parse_pairs("a:b:c", 1).unwrap_err();
        assert_eq!(
            error.to_string(),
            r#"Incorrect format of pair "a:b:c", use --help"#
        );
    }

    #[test]
    fn empty_sides_are_rejected() {
        assert!(parse_pairs(":b", 1).is_err());
        assert!(parse_pairs("a:", 1).is_err());
        assert!(parse_pairs("", 1).is_err());
        assert!(parse_pairs("a:b,", 1).is_err());
    }
}
