use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A marketing campaign shown on the landing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub image_url: Option<String>,
}

impl Campaign {
    /// Active and not yet ended.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date >= now
    }
}

pub fn active_campaigns(campaigns: &[Campaign], now: DateTime<Utc>) -> Vec<Campaign> {
    campaigns
        .iter()
        .filter(|c| c.is_running(now))
        .cloned()
        .collect()
}

/// Campaigns written to a fresh data directory.
pub fn house_campaigns(now: DateTime<Utc>) -> Vec<Campaign> {
    vec![
        Campaign {
            id: Uuid::new_v4(),
            title: "Summer Specials".to_string(),
            description: "Enjoy our limited-time summer menu featuring refreshing iced drinks and fruity flavors.".to_string(),
            start_date: now,
            end_date: now + Duration::days(90),
            is_active: true,
            image_url: None,
        },
        Campaign {
            id: Uuid::new_v4(),
            title: "Loyalty Rewards".to_string(),
            description: "Sign up for our loyalty program and earn points with every purchase. Redeem your points for free drinks, food items, and exclusive merchandise.".to_string(),
            start_date: now,
            end_date: now + Duration::days(365),
            is_active: true,
            image_url: None,
        },
    ]
}
