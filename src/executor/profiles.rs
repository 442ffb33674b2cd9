use crate::config::Profile;

/// Build the argument vector for a single copy-tool invocation under the
/// given performance profile. All profiles run in atomic-move mode: the
/// tool copies then removes each source file only after its bytes are
/// durable on the destination.
pub(crate) fn build_args(profile: Profile, extra: &str, use_progress2: bool) -> Vec<String> {
    let mut args: Vec<String> = match profile {
        Profile::Fast => vec!["-a".to_string(), "--remove-source-files".to_string()],
        Profile::Balanced => {
            vec!["-aX".to_string(), "--remove-source-files".to_string()]
        }
        Profile::Integrity => vec![
            "-aHAX".to_string(),
            "--checksum".to_string(),
            "--remove-source-files".to_string(),
        ],
    };

    if use_progress2 {
        args.push("--info=progress2".to_string());
    } else {
        args.push("--progress".to_string());
    }

    if !extra.trim().is_empty() {
        args.extend(extra.split_whitespace().map(str::to_string));
    }

    args
}
