use serenity::{
    async_trait, builder::CreateMessage, http::Http, model::id::ChannelId,
};
use std::sync::Arc;
use tracing::error;

use crate::{
    audio::player::Announcer,
    sources::Track,
    ui::{buttons, embeds},
};

/// Posts the now-playing embed and its controls to the channel a command came from.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channel_id: ChannelId,
    volume: f32,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, volume: f32) -> Self {
        Self {
            http,
            channel_id,
            volume,
        }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn now_playing(&self, track: &Track, loop_enabled: bool) {
        let message = CreateMessage::new()
            .embed(embeds::now_playing(track, self.volume))
            .components(buttons::player_controls(false, loop_enabled));

        if let Err(e) = self.channel_id.send_message(&self.http, message).await {
            error!("Could not send now playing message: {:?}", e);
        }
    }
}
