//! Secondary validators that suppress regex false positives.
//!
//! A regex match is only reported when its validator (if any) accepts
//! the matched text. Checksums catch the bulk of random digit strings;
//! the date validator rejects numeric triples that cannot be a date.

use chrono::Datelike;

/// Luhn checksum over the decimal digits of `s`.
pub(crate) fn luhn_check(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 2 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &d) in digits.iter().rev().enumerate() {
        let mut val = d;
        if i % 2 == 1 {
            val *= 2;
            if val > 9 {
                val -= 9;
            }
        }
        sum += val;
    }
    sum % 10 == 0
}

/// Credit/debit card: 13-19 digits and a passing Luhn check. No
/// issuer-prefix filter — the checksum alone suppresses random digit
/// runs, and prefix lists go stale (2-series Mastercard BINs).
pub(crate) fn validate_credit_card(s: &str) -> bool {
    let clean: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    (13..=19).contains(&clean.len()) && luhn_check(&clean)
}

/// US SSN area/group sanity: area nonzero, not 666, below 900; group
/// and serial nonzero.
pub(crate) fn validate_ssn(s: &str) -> bool {
    let clean: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if clean.len() != 9 {
        return false;
    }
    let area: u32 = clean[..3].parse().unwrap_or(0);
    let group: u32 = clean[3..5].parse().unwrap_or(0);
    let serial: u32 = clean[5..].parse().unwrap_or(0);
    area > 0 && area != 666 && area < 900 && group > 0 && serial > 0
}

/// National id numbers: a 10-digit form carries one mod-11 check digit
/// computed over the first nine digits with weights 10 down to 2; a
/// 12-digit form carries two check digits computed CPF-style over the
/// leading digits. All-same-digit strings are rejected outright.
pub(crate) fn validate_national_id(s: &str) -> bool {
    let clean: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits: Vec<u32> = clean.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }
    match digits.len() {
        10 => {
            let sum: u32 = digits[..9]
                .iter()
                .enumerate()
                .map(|(i, &d)| d * (10 - i as u32))
                .sum();
            let check = (11 - sum % 11) % 11;
            check < 10 && check == digits[9]
        }
        12 => {
            let c1 = mod11_check_digit(&digits[..10], 11);
            let c2 = mod11_check_digit(&digits[..11], 12);
            c1 == digits[10] && c2 == digits[11]
        }
        _ => false,
    }
}

fn mod11_check_digit(digits: &[u32], first_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| d * (first_weight - i as u32))
        .sum();
    let r = sum % 11;
    if r < 2 { 0 } else { 11 - r }
}

/// IBAN: country prefix, two check digits, and the big-number mod-97
/// test after rotating the first four characters to the end.
pub(crate) fn validate_iban(s: &str) -> bool {
    let clean: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.len() < 15 || clean.len() > 34 {
        return false;
    }
    if !clean[..2].chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }
    if !clean[2..4].chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let rearranged = format!("{}{}", &clean[4..], &clean[..4]);
    let mut remainder = 0u64;
    for ch in rearranged.chars() {
        let value = if ch.is_ascii_uppercase() {
            ch as u64 - 'A' as u64 + 10
        } else if let Some(d) = ch.to_digit(10) {
            d as u64
        } else {
            return false;
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder == 1
}

/// Accept a numeric triple as a date of birth only if some arrangement
/// of its parts reads as (day <= 31, month <= 12, year in
/// [1900, current+1]). Version strings like "1.2.3" have no such
/// arrangement and are rejected.
pub(crate) fn validate_dob(s: &str) -> bool {
    let parts: Vec<u32> = s
        .split(['/', '.', '-'])
        .filter_map(|p| p.trim().parse().ok())
        .collect();
    if parts.len() != 3 {
        return false;
    }
    let max_year = chrono::Utc::now().year() as u32 + 1;
    let is_year = |y: u32| (1900..=max_year).contains(&y);
    let is_day = |d: u32| (1..=31).contains(&d);
    let is_month = |m: u32| (1..=12).contains(&m);
    for year_idx in 0..3 {
        if !is_year(parts[year_idx]) {
            continue;
        }
        let rest: Vec<u32> = (0..3).filter(|&i| i != year_idx).map(|i| parts[i]).collect();
        if (is_day(rest[0]) && is_month(rest[1])) || (is_month(rest[0]) && is_day(rest[1])) {
            return true;
        }
    }
    false
}
