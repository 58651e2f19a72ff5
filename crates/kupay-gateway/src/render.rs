//! HTML Fragments
//!
//! Everything emitted into host pages or emails. Merchant text is escaped
//! before any markup is added around it.

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Typographic replacements: curly quotes, apostrophes, dashes, ellipses
pub fn texturize(text: &str) -> String {
    let text = text.replace("...", "\u{2026}").replace(" -- ", " \u{2013} ");

    let mut out = String::with_capacity(text.len());
    let mut open_double = true;
    let mut prev: Option<char> = None;
    for c in text.chars() {
        match c {
            '"' => {
                out.push(if open_double { '\u{201c}' } else { '\u{201d}' });
                open_double = !open_double;
            }
            '\'' => {
                let opening = prev.is_none_or(|p| p.is_whitespace() || p == '(');
                out.push(if opening { '\u{2018}' } else { '\u{2019}' });
            }
            _ => out.push(c),
        }
        prev = Some(c);
    }
    out
}

/// Wrap blank-line separated blocks in paragraphs; single newlines break
pub fn autop(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<&str> = block.lines().map(str::trim_end).collect();
            format!("<p>{}</p>", lines.join("<br />\n"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merchant instructions as safe rich text
pub fn instructions_html(instructions: &str) -> String {
    autop(&escape_html(&texturize(instructions)))
}

/// Successful return from KuPay
pub fn thank_you(instructions: &str) -> String {
    format!("<h1>Thank you!</h1>\n{}", instructions_html(instructions))
}

/// Cancelled payment, link back to payment method selection
pub fn retry_prompt(checkout_payment_url: &str) -> String {
    format!(
        "<div class=\"woocommerce-error\" role=\"alert\">\
<p>Try your payment again!</p>\
<p><a href=\"{}\">Select Payment Method</a></p>\
</div>",
        escape_html(checkout_payment_url)
    )
}

/// Inline alert for a failed redirect acquisition
pub fn alert(code: u16) -> String {
    format!(
        "<div class=\"woocommerce-error\" role=\"alert\">\
<p>Something went wrong ({code})</p>\
<p>Perhaps the store currency is not supported by the payment gateway?</p>\
</div>"
    )
}

/// Admin error notice
pub fn admin_notice(message: &str) -> String {
    format!(
        "<div class=\"notice notice-error\"><p><span class=\"dashicons dashicons-warning\"></span> {}</p></div>",
        escape_html(message)
    )
}

/// Gateway description on the admin payments screen
pub fn method_description(has_api_key: bool) -> String {
    let sign_up = if has_api_key {
        ""
    } else {
        "<li>You need an API key. Takes one minute only. \
<a href=\"https://kupay.finance/checkout\" target=\"_blank\">Sign up now</a>!</li>"
    };
    format!(
        "Let your customers pay with KuPay crypto payments via Meta Mask.\n\
<ul class=\"ul-disc\">{sign_up}\
<li>Chains supported: KCC, BSC (KCC KuCoin Community Chain, Binance Smart Chain). New chains added soon.</li>\
<li><a href=\"https://docs.kupay.finance/guides/setup-woocommerce\" target=\"_blank\">Setup guide</a></li>\
</ul>"
    )
}

/// Checkout description block showing the KuPay logo
pub fn checkout_description(icon_url: &str) -> String {
    format!(
        "<div style=\"display:block; width:300px; height:auto;\"><img src=\"{}\"></div>",
        escape_html(icon_url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_texturize() {
        assert_eq!(texturize("We'll wait..."), "We\u{2019}ll wait\u{2026}");
        assert_eq!(texturize("say \"hi\""), "say \u{201c}hi\u{201d}");
        assert_eq!(texturize("'quoted'"), "\u{2018}quoted\u{2019}");
        assert_eq!(texturize("a -- b"), "a \u{2013} b");
    }

    #[test]
    fn test_autop() {
        assert_eq!(autop("one\ntwo\r\n\r\nthree"), "<p>one<br />\ntwo</p>\n<p>three</p>");
        assert_eq!(autop("\n\n"), "");
    }

    #[test]
    fn test_instructions_are_sanitized() {
        let html = instructions_html("Thanks!\n\n<b>bold</b>");
        assert_eq!(html, "<p>Thanks!</p>\n<p>&lt;b&gt;bold&lt;/b&gt;</p>");
    }

    #[test]
    fn test_alert_includes_code() {
        assert!(alert(1002).contains("Something went wrong (1002)"));
    }

    #[test]
    fn test_method_description_sign_up_hint() {
        assert!(method_description(false).contains("Sign up now"));
        assert!(!method_description(true).contains("Sign up now"));
    }

    #[test]
    fn test_retry_prompt_escapes_url() {
        let html = retry_prompt("https://shop.example/pay?a=1&b=2");
        assert!(html.contains("href=\"https://shop.example/pay?a=1&amp;b=2\""));
    }
}
