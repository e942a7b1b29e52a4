//! Header spoofing and noise.

use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

use crate::constants::{
    HEADER_ADD_PROBABILITY, HEADER_DROP_PROBABILITY, HEADER_SCRAMBLE_PROBABILITY,
    IP_SPOOF_HEADERS, LOWER_ALNUM, LOWER_ALPHA, SPOOFED_ADDRESSES, USER_AGENTS,
};
use crate::error::StrategyError;
use crate::request::Request;
use crate::util::{pick, random_token};

/// Claims a trusted client address through one to three proxy headers.
pub fn fake_ip(request: &Request, rng: &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> {
    let count = rng.random_range(1..=3);
    let chosen: Vec<&str> = IP_SPOOF_HEADERS
        .choose_multiple(&mut *rng, count)
        .copied()
        .collect();

    let mut variant = request.clone();
    for name in chosen {
        let address = pick(SPOOFED_ADDRESSES, rng);
        variant.headers_mut().insert(name, address);
    }
    Ok(vec![variant])
}

pub fn user_agent(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let agent = pick(USER_AGENTS, rng);
    let mut variant = request.clone();
    let headers = variant.headers_mut();
    headers.remove_ignore_case("User-Agent");
    headers.insert("User-Agent", agent);
    Ok(vec![variant])
}

/// Randomly drops one header, adds an `X-` header and scrambles header values.
///
/// Scrambled values keep their length and use lower-case alphanumerics. The result may
/// equal the input when no coin flip lands.
pub fn header_noise(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let mut variant = request.clone();

    if !request.headers().is_empty() && rng.random_bool(HEADER_DROP_PROBABILITY) {
        let names: Vec<&str> = request.headers().iter().map(|(name, _)| name).collect();
        let victim = pick(&names, rng);
        variant.headers_mut().remove(victim);
    }
    if rng.random_bool(HEADER_ADD_PROBABILITY) {
        let name = format!("X-{}", random_token(LOWER_ALPHA, 5, rng));
        let value = random_token(LOWER_ALNUM, 10, rng);
        variant.headers_mut().insert(name, value);
    }

    let scramble: Vec<bool> = (0..variant.headers().len())
        .map(|_| rng.random_bool(HEADER_SCRAMBLE_PROBABILITY))
        .collect();
    if scramble.contains(&true) {
        for ((_, value), scrambled) in variant.headers_mut().iter_mut().zip(scramble) {
            if scrambled {
                *value = random_token(LOWER_ALNUM, value.chars().count(), rng);
            }
        }
    }
    Ok(vec![variant])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn fake_ip_adds_between_one_and_three_headers() {
        let request = Request::get("http://x/").with_header("Accept", "*/*");
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let variant = &fake_ip(&request, &mut rng).unwrap()[0];
            let added = variant.headers().len() - 1;
            assert!((1..=3).contains(&added));
            for (name, value) in variant.headers().iter().skip(1) {
                assert!(IP_SPOOF_HEADERS.contains(&name));
                assert!(SPOOFED_ADDRESSES.contains(&value));
            }
        }
    }

    #[test]
    fn user_agent_replaces_any_casing() {
        let request = Request::get("http://x/").with_header("user-agent", "sqlmap/1.7");
        let variant = &user_agent(&request, &mut StdRng::seed_from_u64(1)).unwrap()[0];
        assert_eq!(variant.headers().len(), 1);
        assert!(USER_AGENTS.contains(&variant.headers().get("User-Agent").unwrap()));
    }

    #[test]
    fn header_noise_keeps_value_lengths() {
        let request = Request::get("http://x/")
            .with_header("Accept", "*/*")
            .with_header("Cookie", "session=abcdef");
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let variant = &header_noise(&request, &mut rng).unwrap()[0];
            for (name, value) in variant.headers().iter() {
                match request.headers().get(name) {
                    Some(original) => assert_eq!(value.len(), original.len()),
                    None => assert!(name.starts_with("X-") && value.len() == 10),
                }
            }
        }
    }
}
