//! Natural-language date extraction for Spanish chat messages.
//!
//! The parser looks for a date, a clock time or a relative offset anywhere in
//! free text ("mañana a las 8", "el viernes 5pm", "en 20 minutos",
//! "25/12 a las 7 de la noche") and resolves it against a reference instant
//! in a fixed UTC offset. Text without any of those yields `None`.

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, Weekday};

/// Source of absolute instants for free text.
pub trait DateParser: Send + Sync {
    fn parse(&self, text: &str, now: OffsetDateTime) -> Option<OffsetDateTime>;
}

/// Hour used when a date is given without a time of day.
const DEFAULT_HOUR: u8 = 12;

#[derive(Debug, Clone, Copy)]
pub struct SpanishDateParser {
    offset: UtcOffset,
}

impl SpanishDateParser {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl DateParser for SpanishDateParser {
    fn parse(&self, text: &str, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let tokens = tokenize(text);
        let local_now = now.to_offset(self.offset);
        let scan = Scan::run(&tokens, local_now.date());

        if let Some(relative) = scan.relative {
            let target = now.checked_add(relative)?;
            // "en 2 dias a las 8": whole days move the date, the clock stays.
            return match scan.time {
                Some(time) if is_whole_days(relative) => Some(
                    PrimitiveDateTime::new(target.to_offset(self.offset).date(), time)
                        .assume_offset(self.offset),
                ),
                _ => Some(target),
            };
        }

        if scan.date.is_none() && scan.time.is_none() {
            return None;
        }

        let date = scan.date.unwrap_or(local_now.date());
        let time = match scan.time {
            Some(time) => time,
            None => Time::from_hms(DEFAULT_HOUR, 0, 0).ok()?,
        };
        Some(PrimitiveDateTime::new(date, time).assume_offset(self.offset))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut normalized = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        let mapped = match ch {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            '.' => continue,
            c if c.is_alphanumeric() || matches!(c, ':' | '/' | '-') => c,
            _ => ' ',
        };
        normalized.push(mapped);
    }
    normalized.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Default)]
struct Scan {
    date: Option<Date>,
    time: Option<Time>,
    relative: Option<Duration>,
}

impl Scan {
    fn run(tokens: &[String], today: Date) -> Self {
        let mut scan = Scan::default();
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i].as_str();
            let previous = i.checked_sub(1).map(|p| tokens[p].as_str());

            if scan.relative.is_none()
                && let Some((duration, consumed)) = relative_at(tokens, i)
            {
                scan.relative = Some(duration);
                i += consumed;
                continue;
            }

            match token {
                "hoy" => scan.set_date(Some(today)),
                "ayer" => scan.set_date(today.previous_day()),
                "pasado" if tokens.get(i + 1).is_some_and(|t| t == "manana") => {
                    scan.set_date(today.next_day().and_then(Date::next_day));
                    i += 2;
                    continue;
                }
                // "de la mañana" is a time of day, not tomorrow.
                "manana" if previous != Some("la") => scan.set_date(today.next_day()),
                "mediodia" => scan.set_time(12, 0, None),
                "medianoche" => scan.set_time(0, 0, None),
                "esta" if tokens.get(i + 1).is_some_and(|t| t == "noche") => {
                    scan.set_date(Some(today));
                    if scan.time.is_none() {
                        scan.set_time(20, 0, None);
                    }
                    i += 2;
                    continue;
                }
                "a" | "las" | "la" => {
                    let article_follows = tokens
                        .get(i + 1)
                        .is_some_and(|t| t == "las" || t == "la");
                    let start = if token == "a" && article_follows {
                        i + 2
                    } else {
                        i + 1
                    };
                    if let Some(clock) = tokens.get(start).and_then(|t| parse_clock(t, true)) {
                        let consumed = scan.apply_clock(clock, tokens, start + 1);
                        i = start + 1 + consumed;
                        continue;
                    }
                }
                _ => {}
            }

            if let Some(weekday) = weekday_from(token) {
                let strictly_after = matches!(previous, Some("proximo" | "siguiente"));
                scan.set_date(Some(next_weekday(today, weekday, strictly_after)));
            } else if let Some((date, consumed)) = date_at(tokens, i, today) {
                scan.set_date(Some(date));
                i += consumed;
                continue;
            } else if let Some(clock) = parse_clock(token, false) {
                let consumed = scan.apply_clock(clock, tokens, i + 1);
                i += 1 + consumed;
                continue;
            }

            i += 1;
        }

        scan
    }

    fn set_date(&mut self, date: Option<Date>) {
        if let Some(date) = date {
            self.date = Some(date);
        }
    }

    fn set_time(&mut self, hour: u8, minute: u8, meridiem: Option<Meridiem>) {
        let hour = match meridiem {
            Some(Meridiem::Pm) if hour < 12 => hour + 12,
            Some(Meridiem::Am) if hour == 12 => 0,
            _ => hour,
        };
        if let Ok(time) = Time::from_hms(hour, minute, 0) {
            self.time = Some(time);
        }
    }

    /// Applies a clock reading plus any trailing qualifiers ("y media",
    /// "pm", "de la tarde"). Returns how many trailing tokens were consumed.
    fn apply_clock(&mut self, clock: Clock, tokens: &[String], next: usize) -> usize {
        let mut minute = clock.minute;
        let mut meridiem = clock.meridiem;
        let mut consumed = 0;

        let at = |offset: usize| tokens.get(next + offset).map(String::as_str);

        if at(0) == Some("y") {
            let extra = match at(1) {
                Some("media") => Some(30),
                Some("cuarto") => Some(15),
                _ => None,
            };
            if let Some(extra) = extra {
                minute = extra;
                consumed += 2;
            }
        }

        match at(consumed) {
            Some("am") => {
                meridiem = Some(Meridiem::Am);
                consumed += 1;
            }
            Some("pm") => {
                meridiem = Some(Meridiem::Pm);
                consumed += 1;
            }
            Some("de") => {
                let (part, width) = match (at(consumed + 1), at(consumed + 2)) {
                    (Some("la"), Some(part)) => (Some(part), 3),
                    (Some(part), _) => (Some(part), 2),
                    _ => (None, 0),
                };
                let resolved = match part {
                    Some("manana" | "madrugada") => Some(Meridiem::Am),
                    Some("tarde" | "noche") => Some(Meridiem::Pm),
                    _ => None,
                };
                if resolved.is_some() {
                    meridiem = resolved;
                    consumed += width;
                }
            }
            _ => {}
        }

        self.set_time(clock.hour, minute, meridiem);
        consumed
    }
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u8,
    minute: u8,
    meridiem: Option<Meridiem>,
}

/// Parses "8", "08:30", "5pm", "7:15am", "20h". A bare number only counts
/// when `allow_bare` is set, so "3 panes" is not read as three o'clock.
fn parse_clock(token: &str, allow_bare: bool) -> Option<Clock> {
    let (body, meridiem) = if let Some(body) = token.strip_suffix("am") {
        (body, Some(Meridiem::Am))
    } else if let Some(body) = token.strip_suffix("pm") {
        (body, Some(Meridiem::Pm))
    } else if let Some(body) = token.strip_suffix("hrs").or_else(|| token.strip_suffix('h')) {
        (body, None)
    } else {
        (token, None)
    };

    let explicit = meridiem.is_some() || body.len() != token.len() || body.contains(':');
    if !explicit && !allow_bare {
        return None;
    }

    let (hour, minute) = match body.split_once(':') {
        Some((hour, minute)) => (hour, minute),
        None => (body, "0"),
    };
    if hour.is_empty() || hour.len() > 2 || minute.len() > 2 {
        return None;
    }
    let hour: u8 = hour.parse().ok()?;
    let minute: u8 = minute.parse().ok()?;

    let limit = if meridiem.is_some() { 12 } else { 23 };
    if hour > limit || minute > 59 {
        return None;
    }

    Some(Clock {
        hour,
        minute,
        meridiem,
    })
}

fn number_word(token: &str) -> Option<i64> {
    let value = match token {
        "un" | "una" | "uno" => 1,
        "dos" => 2,
        "tres" => 3,
        "cuatro" => 4,
        "cinco" => 5,
        "seis" => 6,
        "siete" => 7,
        "ocho" => 8,
        "nueve" => 9,
        "diez" => 10,
        "quince" => 15,
        "veinte" => 20,
        "treinta" => 30,
        other => return other.parse().ok(),
    };
    Some(value)
}

const SECONDS_PER_DAY: i64 = 86_400;

/// `None` for unknown units, negative amounts and spans too large to
/// represent.
fn unit_duration(token: &str, amount: i64) -> Option<Duration> {
    let unit_seconds = match token {
        "minuto" | "minutos" | "min" | "mins" => 60,
        "hora" | "horas" => 3_600,
        "dia" | "dias" => SECONDS_PER_DAY,
        "semana" | "semanas" => 7 * SECONDS_PER_DAY,
        _ => return None,
    };
    if amount < 0 {
        return None;
    }
    amount.checked_mul(unit_seconds).map(Duration::seconds)
}

fn is_whole_days(duration: Duration) -> bool {
    let seconds = duration.whole_seconds();
    seconds > 0 && seconds % SECONDS_PER_DAY == 0 && duration.subsec_nanoseconds() == 0
}

/// "en 20 minutos", "dentro de una hora y media", "en media hora".
fn relative_at(tokens: &[String], i: usize) -> Option<(Duration, usize)> {
    let at = |offset: usize| tokens.get(i + offset).map(String::as_str);

    let lead = match (at(0), at(1)) {
        (Some("en"), _) => 1,
        (Some("dentro"), Some("de")) => 2,
        _ => return None,
    };

    if at(lead) == Some("media") && matches!(at(lead + 1), Some("hora")) {
        return Some((Duration::minutes(30), lead + 2));
    }

    let amount = number_word(at(lead)?)?;
    let mut duration = unit_duration(at(lead + 1)?, amount)?;
    let mut consumed = lead + 2;

    if at(consumed) == Some("y") && at(consumed + 1) == Some("media") {
        let half = match at(lead + 1) {
            Some("hora" | "horas") => Some(Duration::minutes(30)),
            Some("dia" | "dias") => Some(Duration::hours(12)),
            _ => None,
        };
        if let Some(half) = half {
            duration = duration.checked_add(half)?;
            consumed += 2;
        }
    }

    Some((duration, consumed))
}

fn weekday_from(token: &str) -> Option<Weekday> {
    match token {
        "lunes" => Some(Weekday::Monday),
        "martes" => Some(Weekday::Tuesday),
        "miercoles" => Some(Weekday::Wednesday),
        "jueves" => Some(Weekday::Thursday),
        "viernes" => Some(Weekday::Friday),
        "sabado" => Some(Weekday::Saturday),
        "domingo" => Some(Weekday::Sunday),
        _ => None,
    }
}

fn next_weekday(today: Date, weekday: Weekday, strictly_after: bool) -> Date {
    let current = i64::from(today.weekday().number_days_from_monday());
    let target = i64::from(weekday.number_days_from_monday());
    let mut ahead = (target - current).rem_euclid(7);
    if ahead == 0 && strictly_after {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn month_from(token: &str) -> Option<Month> {
    let month = match token {
        "enero" | "ene" => Month::January,
        "febrero" | "feb" => Month::February,
        "marzo" => Month::March,
        "abril" | "abr" => Month::April,
        "mayo" => Month::May,
        "junio" | "jun" => Month::June,
        "julio" | "jul" => Month::July,
        "agosto" | "ago" => Month::August,
        "septiembre" | "setiembre" | "sep" | "sept" => Month::September,
        "octubre" | "oct" => Month::October,
        "noviembre" | "nov" => Month::November,
        "diciembre" | "dic" => Month::December,
        _ => return None,
    };
    Some(month)
}

/// "25/12", "25/12/2026", "2026-12-25", "25 de diciembre [de 2026]".
fn date_at(tokens: &[String], i: usize, today: Date) -> Option<(Date, usize)> {
    let token = tokens[i].as_str();

    if let Some(date) = numeric_date(token, today) {
        return Some((date, 1));
    }

    let day: u8 = token.parse().ok()?;
    let at = |offset: usize| tokens.get(i + offset).map(String::as_str);
    let (month, mut consumed) = match (at(1), at(2)) {
        (Some("de"), Some(name)) => (month_from(name)?, 3),
        (Some(name), _) => (month_from(name)?, 2),
        _ => return None,
    };

    let mut year = today.year();
    if at(consumed) == Some("de")
        && let Some(explicit) = at(consumed + 1).and_then(|t| t.parse::<i32>().ok())
        && is_plausible_year(explicit)
    {
        year = explicit;
        consumed += 2;
    }

    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some((date, consumed))
}

fn is_plausible_year(value: i32) -> bool {
    (1970..=9999).contains(&value)
}

fn numeric_date(token: &str, today: Date) -> Option<Date> {
    if token.contains('/') {
        let parts: Vec<&str> = token.split('/').collect();
        let (day, month, year) = match parts.as_slice() {
            [day, month] => (*day, *month, None),
            [day, month, year] => (*day, *month, Some(*year)),
            _ => return None,
        };
        let day: u8 = day.parse().ok()?;
        let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
        let year = match year {
            Some(year) if year.len() == 2 => 2000 + year.parse::<i32>().ok()?,
            Some(year) => year.parse::<i32>().ok()?,
            None => today.year(),
        };
        return Date::from_calendar_date(year, month, day).ok();
    }

    let parts: Vec<&str> = token.split('-').collect();
    if let [year, month, day] = parts.as_slice()
        && year.len() == 4
    {
        let year: i32 = year.parse().ok()?;
        let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
        let day: u8 = day.parse().ok()?;
        return Date::from_calendar_date(year, month, day).ok();
    }

    None
}
