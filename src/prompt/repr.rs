/// Quote a string the way list and mapping literals show it in rendered prompts:
/// single quotes, or double quotes when the text holds a single quote and no double quote.
pub(crate) fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(text.len() + 2);
    out.push(delimiter);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("product_name"), "'product_name'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote("say \"it's\""), "'say \"it\\'s\"'");
        assert_eq!(quote("a\\b"), "'a\\\\b'");
    }
}
