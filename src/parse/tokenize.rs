use crate::platform::Platform;

/// Tokenize a command into words.
///
/// POSIX commands use shlex word splitting, falling back to whitespace when
/// shlex rejects the input. Windows commands only honour quotes, since `\`
/// is a path separator there and not an escape.
pub fn tokenize(command: &str, platform: Platform) -> Vec<String> {
    match platform {
        Platform::Unix => shlex::split(command)
            .unwrap_or_else(|| command.split_whitespace().map(String::from).collect()),
        Platform::Windows => split_windows(command),
    }
}

fn split_windows(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut buf = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    for c in command.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => buf.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut buf));
                    in_word = false;
                }
            }
            None => {
                buf.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(buf);
    }
    words
}

/// Split a leading redirection operator off a word: `2>/dev/null` becomes
/// `("2>", "/dev/null")`.
pub fn split_redirect(word: &str) -> (&str, &str) {
    let digits = word.chars().take_while(|c| c.is_ascii_digit()).count();
    let rest = &word[digits..];
    let op_len = if rest.starts_with("&>>") {
        3
    } else if rest.starts_with(">>") || rest.starts_with("&>") || rest.starts_with(">|") {
        2
    } else if rest.starts_with('>') || rest.starts_with('<') {
        1
    } else {
        return ("", word);
    };
    word.split_at(digits + op_len)
}

/// Split `KEY=value` or `--flag=value` into its name and value.
pub fn split_assignment(word: &str) -> Option<(&str, &str)> {
    let (name, value) = word.split_once('=')?;
    let identifier = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let flag = name.starts_with('-') && name.len() > 1;
    (identifier || flag).then_some((name, value))
}

/// Whether a word looks like a path worth normalizing.
pub fn path_like(word: &str, platform: Platform) -> bool {
    if word.is_empty() || word.starts_with('-') || word.contains("://") {
        return false;
    }
    word.starts_with('~')
        || word.starts_with('.')
        || word.contains('$')
        || (platform == Platform::Windows && word.contains('%'))
        || word.chars().any(|c| platform.is_separator(c))
        || platform.is_absolute(word)
}
