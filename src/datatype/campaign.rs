/// A campaign as reported by `GET /campaigner/campaigns` (spec section 8
/// scenario 6). Informational only: this core has no UI to act on it, but
/// exposes it as data the orchestrator can fetch and the event bus can
/// publish.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub id:   String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "autoAccept", default)]
    pub auto_accept: bool,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "estPreparationDuration", default)]
    pub est_preparation_duration: u64,
    #[serde(rename = "estInstallationDuration", default)]
    pub est_installation_duration: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Campaigns {
    pub campaigns: Vec<Campaign>,
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json as json;

    #[test]
    fn campaign_round_trips_through_json() {
        let text = r#"{"campaigns":[{"id":"c1","name":"spring rollout","size":3}]}"#;
        let parsed: Campaigns = json::from_str(text).unwrap();
        assert_eq!(parsed.campaigns.len(), 1);
        assert_eq!(parsed.campaigns[0].id, "c1");

        let reencoded = json::to_string(&parsed).unwrap();
        let roundtrip: Campaigns = json::from_str(&reencoded).unwrap();
        assert_eq!(parsed, roundtrip);
    }

    /// Scenario 6: every recognized field, not just `id`/`name`/`size`,
    /// survives a parse/serialize/parse round trip.
    #[test]
    fn campaign_round_trip_preserves_every_recognized_field() {
        let text = r#"{"id":"c2eb7e8d-8aa0-429d-883f-5ed8fdb2a493","name":"campaign1","size":62470,
                        "autoAccept":true,"description":"a rollout",
                        "estInstallationDuration":10,"estPreparationDuration":20}"#;
        let parsed: Campaign = json::from_str(text).unwrap();
        assert_eq!(parsed.auto_accept, true);
        assert_eq!(parsed.description, "a rollout");
        assert_eq!(parsed.est_preparation_duration, 20);
        assert_eq!(parsed.est_installation_duration, 10);

        let reencoded = json::to_string(&parsed).unwrap();
        let roundtrip: Campaign = json::from_str(&reencoded).unwrap();
        assert_eq!(parsed, roundtrip);
    }
}
