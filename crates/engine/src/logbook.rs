//! Lazy logbook seeding.
//!
//! The first time an athlete shows up without a logbook, one is created
//! from their profile (best-effort — a failed profile fetch seeds an empty
//! logbook instead). The model maintains the content from then on through
//! `update-athlete-logbook`.

use pl_domain::model::{Logbook, User};
use pl_strava::types::Athlete;

use crate::state::AppState;

/// Fetch the athlete's logbook, creating it on first contact.
/// Returns `None` only when the store itself fails.
pub async fn ensure_initial(state: &AppState, user: &User) -> Option<Logbook> {
    match state.logbooks.get(&user.id).await {
        Ok(Some(logbook)) => Some(logbook),
        Ok(None) => {
            let seed = match state.strava.athlete(user).await {
                Ok(athlete) => seed_from_profile(&athlete),
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %user.id, "profile fetch failed; seeding empty logbook");
                    String::new()
                }
            };
            match state.logbooks.create_initial(&user.id, &seed).await {
                Ok(logbook) => Some(logbook),
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %user.id, "failed to seed logbook");
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user.id, "logbook read failed");
            None
        }
    }
}

fn seed_from_profile(athlete: &Athlete) -> String {
    let mut seed = format!("# Athlete: {}\n\n", athlete.full_name());
    if let (Some(city), Some(country)) = (&athlete.city, &athlete.country) {
        seed.push_str(&format!("- Based in {city}, {country}\n"));
    }
    if let Some(weight) = athlete.weight {
        seed.push_str(&format!("- Weight: {weight:.1} kg\n"));
    }
    if let Some(ftp) = athlete.ftp {
        seed.push_str(&format!("- FTP: {ftp:.0} W\n"));
    }
    seed.push_str("\n(No coaching notes yet.)\n");
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_includes_profile_facts() {
        let athlete = Athlete {
            id: 1,
            firstname: Some("Ann".into()),
            lastname: Some("Rider".into()),
            city: Some("Ghent".into()),
            country: Some("Belgium".into()),
            ftp: Some(240.0),
            ..Athlete::default()
        };
        let seed = seed_from_profile(&athlete);
        assert!(seed.contains("Ann Rider"));
        assert!(seed.contains("Ghent, Belgium"));
        assert!(seed.contains("FTP: 240 W"));
    }
}
