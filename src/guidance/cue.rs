/// Fixed guidance content for one instruction: what to say and which
/// picture/clip illustrates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cue {
    pub speech: &'static str,
    pub image: &'static str,
    pub video: &'static str,
}

pub const PUT_TRAY: Cue = Cue {
    speech: "Put the tray on the table.",
    image: "tray.jpg",
    video: "tray.mp4",
};

pub const SHOW_LEVER: Cue = Cue {
    speech: "Good job. Now show me the lever",
    image: "lever.jpg",
    video: "lever.mp4",
};

pub const ATTACH_LEVER: Cue = Cue {
    speech: "Good job. Now assemble the lever onto tray. Show me the vertical view.",
    image: "dangling.jpg",
    video: "dangling.mp4",
};

pub const LEVER_MISPLACED: Cue = Cue {
    speech: "The lever is misplaced. Please make sure it is secure.",
    image: "dangling.jpg",
    video: "dangling.mp4",
};

pub const FIND_CAP: Cue = Cue {
    speech: "Find the cap and show me the side view with pin holding up",
    image: "cap.jpg",
    video: "cap.mp4",
};

pub const ASSEMBLE_CAP: Cue = Cue {
    speech: "Excellent. Now assemble the cap onto the tray. Start from left to right. \
             Show me a vertical view when done",
    image: "assembled.jpg",
    video: "assembled.mp4",
};

pub const CHECK_PIN: Cue = Cue {
    speech: "Awesome. Show me a close-up view to see if the pin is at right place.",
    image: "pin.jpg",
    video: "pin.mp4",
};

pub const PLACE_PIN: Cue = Cue {
    speech: "Please place the pin into the slot.",
    image: "pin.jpg",
    video: "pin.mp4",
};

pub const CLOSE_LEVER: Cue = Cue {
    speech: "Fabulous. Now close the lever.",
    image: "clamped.jpg",
    video: "clamped.mp4",
};

pub const FINISHED: Cue = Cue {
    speech: "Finished! Congratulations!",
    image: "finished.jpg",
    video: "finished.mp4",
};
