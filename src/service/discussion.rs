//! Discussion handlers.
//!
//! Both handlers bring the stored state up to date with
//! [`advance_if_due`] before looking at it.

use tracing::{debug, info, instrument, warn};

use super::types::{DiscussionAction, DiscussionView};
use super::Coordinator;
use crate::chain::{alive_players, GameChain, RoomInfo, RoomPhase};
use crate::core::address::{Address, DayCount, RoomId};
use crate::core::rng::speaker_order;
use crate::error::{CoordError, CoordResult};
use crate::game::{advance_if_due, skip, DiscussionPhase, DiscussionState};
use crate::proof::ProofBackend;
use crate::store::KvStore;

/// Room facts a discussion handler needs.
struct DayContext {
    room: RoomInfo,
    day: DayCount,
    order: Vec<Address>,
}

impl DayContext {
    fn total_speakers(&self) -> u32 {
        self.order.len() as u32
    }
}

impl<C: GameChain, K: KvStore, P: ProofBackend> Coordinator<C, K, P> {
    /// Current discussion state for a day, advanced if due.
    ///
    /// `day` defaults to the room's on-chain day counter.
    #[instrument(skip(self), level = "debug")]
    pub async fn discussion_state(
        &self,
        room_id: RoomId,
        day: Option<DayCount>,
        viewer: Option<Address>,
    ) -> CoordResult<DiscussionView> {
        let ctx = self.day_context(room_id, day).await?;
        let Some(stored) = self.discussions.load(room_id, ctx.day).await? else {
            debug!("No discussion for room {} day {}", room_id, ctx.day);
            return Ok(DiscussionView::not_started(ctx.total_speakers()));
        };

        let now = self.clock.now_ms();
        let state = self.advance_and_save(room_id, &ctx, stored, now).await?;
        Ok(DiscussionView::render(&state, &ctx.order, now, viewer))
    }

    /// Start the discussion or skip the current speaker.
    #[instrument(skip(self))]
    pub async fn discussion_action(
        &self,
        room_id: RoomId,
        day: Option<DayCount>,
        action: DiscussionAction,
        player: Address,
    ) -> CoordResult<DiscussionView> {
        let ctx = self.day_context(room_id, day).await?;
        let now = self.clock.now_ms();
        let stored = self.discussions.load(room_id, ctx.day).await?;

        let state = match (action, stored) {
            (DiscussionAction::Start, Some(existing)) => {
                debug!("Discussion for room {} day {} already started", room_id, ctx.day);
                self.advance_and_save(room_id, &ctx, existing, now).await?
            }
            (DiscussionAction::Start, None) => {
                if ctx.room.phase != RoomPhase::Day {
                    return Err(CoordError::validation(format!(
                        "discussion can only start during the day, room is in {:?}",
                        ctx.room.phase
                    )));
                }
                let fresh = DiscussionState::start(now, self.config.timing);
                self.discussions.save(room_id, ctx.day, &fresh).await?;
                info!(
                    "Discussion started for room {} day {} with {} speakers",
                    room_id,
                    ctx.day,
                    ctx.total_speakers()
                );
                fresh
            }
            (DiscussionAction::Skip, None) => {
                return Err(CoordError::not_found(format!(
                    "no discussion for room {} day {}",
                    room_id, ctx.day
                )));
            }
            (DiscussionAction::Skip, Some(existing)) => {
                let current = self.advance_and_save(room_id, &ctx, existing, now).await?;
                if current.phase == DiscussionPhase::Speaking {
                    let speaker = ctx.order.get(current.current_speaker_index as usize).copied();
                    if speaker != Some(player) && player != ctx.room.host {
                        warn!("Rejected skip from {} in room {}", player, room_id);
                        return Err(CoordError::unauthorized(
                            "only the current speaker or the host may skip",
                        ));
                    }
                }

                let next = skip(&current, now, ctx.total_speakers())?;
                if next != current {
                    self.discussions.save(room_id, ctx.day, &next).await?;
                    info!(
                        "Speaker {} skipped by {} in room {}",
                        current.current_speaker_index, player, room_id
                    );
                }
                next
            }
        };

        Ok(DiscussionView::render(&state, &ctx.order, now, Some(player)))
    }

    async fn day_context(&self, room_id: RoomId, day: Option<DayCount>) -> CoordResult<DayContext> {
        let room = self.chain.room(room_id).await?;
        let alive = alive_players(self.chain.as_ref(), room_id).await?;
        Ok(DayContext {
            day: day.unwrap_or(room.day_count),
            order: speaker_order(room_id, &alive),
            room,
        })
    }

    async fn advance_and_save(
        &self,
        room_id: RoomId,
        ctx: &DayContext,
        stored: DiscussionState,
        now: u64,
    ) -> CoordResult<DiscussionState> {
        let next = advance_if_due(&stored, now, ctx.total_speakers());
        if next != stored {
            self.discussions.save(room_id, ctx.day, &next).await?;
            match next.phase {
                DiscussionPhase::Finished => info!("Discussion finished for room {} day {}", room_id, ctx.day),
                _ => info!(
                    "Room {} day {}: speaker {} has the floor",
                    room_id, ctx.day, next.current_speaker_index
                ),
            }
        }
        Ok(next)
    }
}
