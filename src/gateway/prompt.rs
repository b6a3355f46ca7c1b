//! Prompt sent to the chat model to turn a transcript into minutes.

const MEETING_SUMMARY_TEMPLATE: &str = r#"You are an expert at writing meeting minutes. Analyse the meeting transcript below and produce minutes as a single JSON object.

TRANSCRIPT:
{transcription}

REQUIREMENTS:
1. Summarise the main content of the meeting concisely and clearly.
2. List the key points discussed (key_points).
3. List the action items (action_items), naming the owner when known.
4. Identify the participants (participants) from voices and context.
5. Estimate the meeting duration (meeting_duration) when possible.

OUTPUT FORMAT:
{
  "summary": "Overall summary of the meeting...",
  "key_points": ["First key point", "Second key point"],
  "action_items": ["Task 1: description - owner", "Task 2: description - owner"],
  "participants": ["Participant 1", "Participant 2"],
  "meeting_duration": "XX minutes"
}

NOTES:
- Write every value in the language with code "{language}".
- Stay accurate and objective.
- Use an empty array [] when a field has no information.
- Return valid JSON only."#;

pub fn meeting_summary_prompt(transcription: &str, language: &str) -> String {
    MEETING_SUMMARY_TEMPLATE
        .replace("{language}", language)
        .replace("{transcription}", transcription)
}
