//! Free-text pattern normalization.
//!
//! Collapses variable tokens so that messages differing only in ids,
//! addresses or counters group under one pattern. Passes run in a fixed
//! order and the output is a fixed point: `normalize(normalize(x)) == normalize(x)`.

use std::sync::OnceLock;

use regex::Regex;

pub const UUID_TOKEN: &str = "#UUID#";
pub const EMAIL_TOKEN: &str = "#EMAIL#";
pub const IP_TOKEN: &str = "#IP#";
pub const MAC_TOKEN: &str = "#MAC#";
pub const NUM_TOKEN: &str = "#NUM#";

struct Passes {
    uuid: Regex,
    email: Regex,
    ipv4: Regex,
    mac: Regex,
    number: Regex,
}

fn passes() -> &'static Passes {
    static PASSES: OnceLock<Passes> = OnceLock::new();
    PASSES.get_or_init(|| Passes {
        uuid: Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .expect("uuid pattern"),
        email: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern"),
        ipv4: Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("ipv4 pattern"),
        mac: Regex::new(r"\b(?:[0-9a-fA-F]{2}[:-]){5}[0-9a-fA-F]{2}\b").expect("mac pattern"),
        number: Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]+)?|\.[0-9]+)$").expect("number pattern"),
    })
}

/// Normalize a message into its pattern.
pub fn normalize(text: &str) -> String {
    let p = passes();
    let text = p.uuid.replace_all(text, UUID_TOKEN);
    let text = p.email.replace_all(&text, EMAIL_TOKEN);
    let text = p.ipv4.replace_all(&text, IP_TOKEN);
    let text = p.mac.replace_all(&text, MAC_TOKEN);
    replace_standalone_numbers(&text, &p.number)
}

/// Replace whitespace-delimited tokens that are numbers. Surrounding
/// brackets and trailing punctuation are kept (`(42),` -> `(#NUM#),`).
fn replace_standalone_numbers(text: &str, number: &Regex) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token_start = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = token_start.take() {
                push_token(&mut out, &text[start..i], number);
            }
            out.push(ch);
        } else if token_start.is_none() {
            token_start = Some(i);
        }
    }
    if let Some(start) = token_start {
        push_token(&mut out, &text[start..], number);
    }
    out
}

fn push_token(out: &mut String, token: &str, number: &Regex) {
    let core_start = token.len() - token.trim_start_matches(['(', '[']).len();
    let trimmed = token.trim_end_matches([',', ';', ':', ')', ']']);
    let core_end = trimmed.len().max(core_start);
    let core = &token[core_start..core_end];

    if !core.is_empty() && number.is_match(core) {
        out.push_str(&token[..core_start]);
        out.push_str(NUM_TOKEN);
        out.push_str(&token[core_end..]);
    } else {
        out.push_str(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_pass_replaces_its_token() {
        assert_eq!(
            normalize("job 123e4567-e89b-12d3-a456-426614174000 done"),
            "job #UUID# done"
        );
        assert_eq!(normalize("mail to ops@example.com bounced"), "mail to #EMAIL# bounced");
        assert_eq!(normalize("connect from 10.0.0.5 port 22"), "connect from #IP# port #NUM#");
        assert_eq!(normalize("dhcp ack aa:bb:cc:dd:ee:ff"), "dhcp ack #MAC#");
        assert_eq!(normalize("took 0.25 s, retries 3"), "took #NUM# s, retries #NUM#");
    }

    #[test]
    fn su_failure_keeps_words_and_replaces_session_number() {
        let pattern = normalize("mymachine su 'su root' failed for lonvick on /dev/pts/8 session 4711");
        assert_eq!(
            pattern,
            "mymachine su 'su root' failed for lonvick on /dev/pts/8 session #NUM#"
        );
    }

    #[test]
    fn numbers_inside_words_are_kept() {
        assert_eq!(normalize("eth0 up, vlan10 ok"), "eth0 up, vlan10 ok");
        assert_eq!(normalize("pid=42"), "pid=42");
        assert_eq!(normalize("code (404)"), "code (#NUM#)");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "user bob@corp.io from 192.168.1.20 mac 00-1B-44-11-3A-B7 uuid 123e4567-e89b-12d3-a456-426614174000 n 5",
            "  leading and trailing  42  ",
            "#NUM# #IP# already normalized",
            "",
            "1.2.3.4.5",
            "1.2.3.4.5.6.7.8",
            "aa:bb:cc:dd:ee:ff:aa:bb:cc:dd:ee:ff",
            "00-1B-44-11-3A-B7-00-1B-44-11-3A-B7",
            "(42), 10.0.0.1 [7]; -3: 8",
            "(42),10.0.0.1",
            "10.0.0.1:8080 -> 10.0.0.2:443",
            "a1@b2.io,192.168.0.1;(0.5)",
            "123e4567-e89b-12d3-a456-426614174000:1.2.3.4",
            "#NUM#5 #IP#.7 ( ) , ;",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn adjacent_tokens() {
        assert_eq!(normalize("1.2.3.4.5"), "#IP#.5");
        assert_eq!(normalize("aa:bb:cc:dd:ee:ff:aa:bb:cc:dd:ee:ff"), "#MAC#:#MAC#");
        assert_eq!(normalize("(42), 10.0.0.1"), "(#NUM#), #IP#");
        assert_eq!(normalize("10.0.0.1:8080"), "#IP#:8080");
    }

    #[test]
    fn whitespace_is_preserved() {
        assert_eq!(normalize("a  1\tb"), "a  #NUM#\tb");
    }
}
