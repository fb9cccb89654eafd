//! Telegram-ready alert text (HTML parse mode)

use crate::types::{Batch, Reading, TriggerResult};

/// Escape the three characters Telegram's HTML mode treats as markup.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render the notification body for one alert.
pub fn render(batch: &Batch, reading: &Reading, evidence: &TriggerResult) -> String {
    let name = escape_html(&batch.name);
    let status_lines = format!(
        "📊 Batch: {name}\n🌡️ Temperature: {:.1}°C\n⚖️ Gravity: {:.4}",
        reading.temperature, reading.gravity
    );

    match evidence {
        TriggerResult::AttenuationReached {
            attenuation,
            threshold,
            ..
        } => format!(
            "🍺 <b>ALERT: Time for the diacetyl rest!</b>\n\n\
             {status_lines}\n\
             📈 Attenuation: <b>{:.1}%</b> (target: {:.1}%)\n\n\
             🎯 <b>Recommended action:</b>\n\
             Raise the temperature to {:.1}°C for a 48-72h diacetyl rest",
            attenuation * 100.0,
            threshold * 100.0,
            batch.temp_target
        ),
        TriggerResult::GravityStable {
            range_points,
            window_hours,
            ..
        } => format!(
            "⚖️ <b>Gravity has stabilized</b>\n\n\
             {status_lines}\n\
             📉 Variation: {range_points:.1} points over the last {window_hours:.0}h\n\n\
             Fermentation is likely finishing; check the diacetyl rest and FG ({:.3}).",
            batch.fg_target
        ),
        TriggerResult::TemperatureDescending {
            first_temperature,
            last_temperature,
            descent,
            window_hours,
            ..
        } => format!(
            "🌡️ <b>Temperature is dropping</b>\n\n\
             {status_lines}\n\
             📉 {first_temperature:.1}°C → {last_temperature:.1}°C \
             (-{descent:.1}°C in {window_hours:.0}h)\n\n\
             Yeast activity is slowing down."
        ),
        TriggerResult::ForecastReady {
            hours_to_target,
            slope_per_hour,
            target_gravity,
            eta,
            ..
        } => format!(
            "🔮 <b>Fermentation forecast</b>\n\n\
             {status_lines}\n\
             ⏳ FG {target_gravity:.3} expected in ~{hours_to_target:.0}h \
             ({})\n\
             📉 Trend: {:.2} points/day",
            eta.format("%Y-%m-%d %H:%M UTC"),
            slope_per_hour * 24.0 * 1000.0
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchId, BatchStatus};
    use chrono::Utc;

    fn batch(name: &str) -> Batch {
        Batch {
            id: BatchId(7),
            name: name.into(),
            yeast_profile: "ale".into(),
            og: 1.050,
            fg_target: 1.010,
            temp_target: 21.0,
            status: BatchStatus::Active,
            started_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn reading() -> Reading {
        Reading {
            batch_id: BatchId(7),
            timestamp: Utc::now(),
            gravity: 1.0102,
            temperature: 18.4,
            battery: 80.0,
            attenuation: 0.8,
        }
    }

    #[test]
    fn attenuation_message_recommends_rest() {
        let msg = render(
            &batch("IPA"),
            &reading(),
            &TriggerResult::AttenuationReached {
                attenuation: 0.804,
                previous_attenuation: 0.79,
                threshold: 0.8,
            },
        );
        assert!(msg.contains("80.4%"));
        assert!(msg.contains("21.0°C"));
        assert!(msg.contains("1.0102"));
    }

    #[test]
    fn batch_name_is_escaped() {
        let msg = render(
            &batch("<Brown & Co>"),
            &reading(),
            &TriggerResult::TemperatureDescending {
                first_temperature: 20.0,
                last_temperature: 19.0,
                descent: 1.0,
                threshold: 0.5,
                window_hours: 6.0,
            },
        );
        assert!(msg.contains("&lt;Brown &amp; Co&gt;"));
    }
}
