//! Proxy auto-config (PAC) script rendering.
//!
//! Browsers fetch `/proxy.pac` and route only the allow-listed URLs through
//! this proxy; everything else goes direct.

/// Render a `FindProxyForURL` script for the given URL globs.
pub fn render(urls: &[String], public_address: &str) -> String {
    let list = urls
        .iter()
        .map(|url| format!("        '{}'", escape_js(url)))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "function FindProxyForURL(url, host) {{\n\
        \x20   var list = [\n\
        {list}\n\
        \x20   ];\n\
        \x20   for (var i = 0; i < list.length; i++) {{\n\
        \x20       if (shExpMatch(url, list[i])) {{\n\
        \x20           return 'PROXY {address}; DIRECT';\n\
        \x20       }}\n\
        \x20   }}\n\
        \x20   return 'DIRECT';\n\
        }}\n",
        list = list,
        address = escape_js(public_address),
    )
}

fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_lists_urls_and_proxy() {
        let urls = vec!["http://v.youku.com/player/*".to_string(), "http://a.com/x".to_string()];
        let script = render(&urls, "203.0.113.7:8888");
        assert!(script.starts_with("function FindProxyForURL(url, host) {\n"));
        let expected = "        'http://v.youku.com/player/*',\n        'http://a.com/x'\n";
        assert!(script.contains(expected));
        assert!(script.contains("return 'PROXY 203.0.113.7:8888; DIRECT';"));
        assert!(script.trim_end().ends_with("return 'DIRECT';\n}"));
    }

    #[test]
    fn quotes_are_escaped() {
        let script = render(&["http://a.com/it's*".to_string()], "uku.im");
        assert!(script.contains(r"'http://a.com/it\'s*'"));
    }

    #[test]
    fn empty_list_always_direct() {
        let script = render(&[], "uku.im");
        assert!(script.contains("var list = [\n\n    ];"));
    }
}
