//! Dictionaries used by the built-in strategies.
//! Kept in one place so that tuning a wordlist never touches strategy logic.

/// Media types that a WAF may or may not have body parsers for.
pub const CONTENT_TYPES: &[&str] = &[
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
    "application/json",
    "application/xml",
    "text/xml",
    "application/octet-stream",
];

/// The form media type used when a request is turned into a form submission.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An EBCDIC charset most inspection engines do not decode.
pub const EBCDIC_FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=ibm037";

/// The preferred `Accept-Charset` value and the probability of choosing it.
pub const PRIMARY_ACCEPT_CHARSET: &str = "utf-32; q=0.5";
pub const PRIMARY_ACCEPT_CHARSET_PROBABILITY: f64 = 0.73;

/// Alternatives picked uniformly when the primary value is not chosen.
pub const ACCEPT_CHARSETS: &[&str] = &[
    "utf-8; q=1.0",
    "iso-8859-1; q=0.8",
    "windows-1252; q=0.3",
    "utf-16; q=0.7",
    "gb2312; q=0.6",
    "shift_jis; q=0.4",
    "utf-32; q=0.5, utf-8; q=1.0",
    "* ; q=0.1",
];

/// Charset suffixes appended to a generated multipart `Content-Type`.
pub const MULTIPART_CHARSETS: &[&str] = &["", ", charset=ibm500", ", charset=ibm037"];

/// Headers that proxies use to convey the client address.
pub const IP_SPOOF_HEADERS: &[&str] = &[
    "X-Originating-IP",
    "X-Forwarded-For",
    "X-Remote-IP",
    "X-Remote-Addr",
    "X-Client-IP",
];

/// Loopback and private addresses that are commonly allow-listed.
pub const SPOOFED_ADDRESSES: &[&str] = &["127.0.0.1", "192.168.1.1", "10.0.0.1", "172.16.0.1"];

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    "Mozilla/5.0 (compatible; Bingbot/2.0; +http://www.bing.com/bingbot.htm)",
];

/// Suffixes appended to the request path.
pub const TRAVERSAL_PAYLOADS: &[&str] = &["../../../../etc/passwd", "..%2f..%2fetc%2fpasswd"];

/// Values injected before the real one when a parameter is repeated.
pub const DECOY_VALUES: &[&str] = &["ls", "1", "1.jpg"];

/// A command prepended to command-like parameter values.
pub const HARMLESS_COMMAND: &str = "ls;";

/// Executable extensions that servers map to the same handler.
pub const SCRIPT_EXTENSIONS: &[&str] = &[
    "phtml", "php3", "php4", "php5", "inc", "pHtml", "pHp", "pHp3", "pHp4", "pHp5", "iNc",
];

/// Amount of filler placed in front of the payload. Many WAFs only inspect a prefix.
pub const PADDING_LEN: usize = 1024;

/// Alphabet for random header names and values.
pub const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const LOWER_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const HEX_DIGITS: &[u8] = b"0123456789abcdef";

/// Filler characters inserted by the garbage obfuscation.
pub const GARBAGE_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*~+-_.,:;?@[/|\\]^`=";

/// Probability of touching a header in the header-noise strategy.
pub const HEADER_DROP_PROBABILITY: f64 = 0.2;
pub const HEADER_ADD_PROBABILITY: f64 = 0.2;
pub const HEADER_SCRAMBLE_PROBABILITY: f64 = 0.3;
