use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(PAGE)
}

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AI Hemoglobin Predictor</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: #f1f5f9;
            color: #1e293b;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.15);
            max-width: 640px;
            width: 100%;
            overflow: hidden;
        }

        header {
            background: linear-gradient(90deg, #3b82f6 0%, #2dd4bf 100%);
            color: white;
            text-align: center;
            padding: 24px;
        }

        header p {
            margin-top: 8px;
            color: #dbeafe;
        }

        main {
            padding: 32px;
        }

        .upload-area {
            border: 2px dashed #cbd5e1;
            border-radius: 12px;
            padding: 60px 20px;
            text-align: center;
            cursor: pointer;
            color: #64748b;
            transition: all 0.3s;
        }

        .upload-area:hover,
        .upload-area.dragover {
            border-color: #3b82f6;
            background: #f8fafc;
        }

        .upload-text {
            font-weight: 600;
            margin-bottom: 6px;
        }

        input[type="file"] {
            display: none;
        }

        .preview-image {
            display: block;
            max-width: 100%;
            margin: 0 auto;
            border-radius: 10px;
        }

        .actions {
            display: flex;
            gap: 12px;
            justify-content: center;
            margin-top: 20px;
        }

        button {
            border: none;
            border-radius: 10px;
            padding: 12px 24px;
            font-weight: 700;
            cursor: pointer;
            color: white;
            background: #3b82f6;
        }

        button.secondary {
            background: #94a3b8;
        }

        button:disabled {
            opacity: 0.5;
            cursor: not-allowed;
        }

        .loading {
            text-align: center;
            padding: 40px;
        }

        .spinner {
            border: 4px dashed #3b82f6;
            border-radius: 50%;
            width: 64px;
            height: 64px;
            animation: spin 1.5s linear infinite;
            margin: 0 auto 20px;
        }

        @keyframes spin {
            0% { transform: rotate(0deg); }
            100% { transform: rotate(360deg); }
        }

        .result {
            text-align: center;
        }

        .gauge {
            position: relative;
            width: 200px;
            height: 100px;
            margin: 24px auto;
            overflow: hidden;
        }

        .gauge-track,
        .gauge-fill {
            position: absolute;
            inset: 0;
            border: 10px solid #e2e8f0;
            border-bottom: none;
            border-radius: 100px 100px 0 0;
        }

        .gauge-fill {
            transform-origin: 50% 100%;
            transition: transform 1s;
        }

        .gauge-value {
            position: absolute;
            bottom: 0;
            width: 100%;
            font-size: 2em;
            font-weight: 700;
        }

        .status-Low { color: #ef4444; border-color: #ef4444; }
        .status-Normal { color: #22c55e; border-color: #22c55e; }
        .status-High { color: #f97316; border-color: #f97316; }

        .analysis {
            background: #f1f5f9;
            border-radius: 10px;
            padding: 16px;
            margin-top: 20px;
            text-align: left;
        }

        .error {
            background: #fee2e2;
            border: 1px solid #f87171;
            color: #b91c1c;
            padding: 12px 16px;
            border-radius: 10px;
            margin-top: 20px;
            text-align: center;
        }

        .disclaimer {
            background: #fefce8;
            border-top: 1px solid #fef08a;
            color: #a16207;
            font-size: 0.85em;
            padding: 16px 32px;
        }

        .hidden {
            display: none;
        }
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>AI Hemoglobin Predictor</h1>
            <p>Estimate Hb levels from a nailbed image.</p>
        </header>

        <main>
            <section id="uploader">
                <div class="upload-area" id="uploadArea">
                    <div class="upload-text">Click to upload image</div>
                    <div>or drag and drop (PNG, JPEG, WebP)</div>
                </div>
                <img id="previewImage" class="preview-image hidden" alt="Nailbed preview">
                <input type="file" id="fileInput" accept="image/png, image/jpeg, image/webp">
                <div class="error hidden" id="error"></div>
                <div class="actions">
                    <button id="predictButton" class="hidden">Predict Hb Level</button>
                    <button id="clearButton" class="secondary hidden">Reset</button>
                </div>
            </section>

            <section id="loading" class="loading hidden">
                <div class="spinner"></div>
                <p id="loadingMessage">Processing...</p>
            </section>

            <section id="result" class="result hidden">
                <h2>Prediction Result</h2>
                <div class="gauge">
                    <div class="gauge-track"></div>
                    <div class="gauge-fill" id="gaugeFill"></div>
                    <div class="gauge-value" id="hbValue"></div>
                </div>
                <p><strong id="hbStatus"></strong></p>
                <p id="confidence"></p>
                <div class="analysis">
                    <h3>AI Analysis</h3>
                    <p id="analysis"></p>
                </div>
                <div class="actions">
                    <button id="resetButton">Analyze Another Image</button>
                </div>
            </section>
        </main>

        <div class="disclaimer">
            <strong>For Informational Purposes Only.</strong>
            This AI-powered prediction is not a medical diagnosis. It is an experimental tool and
            should not be used as a substitute for professional medical advice, diagnosis, or
            treatment. Always consult with a qualified healthcare provider.
        </div>
    </div>

    <script>
        const $ = (id) => document.getElementById(id);
        const uploadArea = $('uploadArea');
        const fileInput = $('fileInput');
        const previewImage = $('previewImage');
        const errorDiv = $('error');
        const predictButton = $('predictButton');
        let sessionId = null;
        let polling = null;

        async function api(method, path, body) {
            const response = await fetch(`/api/sessions${path}`, { method, body });
            const payload = await response.json().catch(() => ({}));
            if (!response.ok) {
                throw new Error(payload.error || 'Request failed');
            }
            return payload;
        }

        function show(section) {
            for (const id of ['uploader', 'loading', 'result']) {
                $(id).classList.toggle('hidden', id !== section);
            }
        }

        function showError(message) {
            errorDiv.textContent = message || '';
            errorDiv.classList.toggle('hidden', !message);
        }

        function render(snapshot) {
            if (snapshot.phase === 'validating' || snapshot.phase === 'analyzing') {
                $('loadingMessage').textContent = snapshot.message || 'Processing...';
                show('loading');
                predictButton.disabled = true;
                schedulePoll();
                return;
            }

            predictButton.disabled = false;

            if (snapshot.phase === 'result') {
                const result = snapshot.result;
                const rotation = -180 + result.gaugeFraction * 180;
                $('gaugeFill').className = `gauge-fill status-${result.status}`;
                $('gaugeFill').style.transform = `rotate(${rotation}deg)`;
                $('hbValue').textContent = `${result.hbValue.toFixed(1)} g/dL`;
                $('hbValue').className = `gauge-value status-${result.status}`;
                $('hbStatus').textContent = result.status;
                $('hbStatus').className = `status-${result.status}`;
                $('confidence').textContent = `Confidence: ${result.confidencePercent}%`;
                $('analysis').textContent = result.analysis;
                show('result');
                return;
            }

            show('uploader');
            showError(snapshot.error);
            predictButton.classList.toggle('hidden', !snapshot.hasImage || !['idle', 'failed'].includes(snapshot.phase));
            $('clearButton').classList.toggle('hidden', !snapshot.hasImage);
            uploadArea.classList.toggle('hidden', snapshot.hasImage);
            previewImage.classList.toggle('hidden', !snapshot.hasImage);
        }

        function schedulePoll() {
            clearTimeout(polling);
            polling = setTimeout(async () => {
                try {
                    render(await api('GET', `/${sessionId}`));
                } catch (error) {
                    show('uploader');
                    showError(error.message);
                }
            }, 700);
        }

        async function handleFile(file) {
            previewImage.src = URL.createObjectURL(file);
            const formData = new FormData();
            formData.append('image', file);
            try {
                render(await api('POST', `/${sessionId}/image`, formData));
            } catch (error) {
                showError(error.message);
            }
        }

        async function reset() {
            clearTimeout(polling);
            fileInput.value = '';
            previewImage.removeAttribute('src');
            render(await api('POST', `/${sessionId}/reset`));
        }

        uploadArea.addEventListener('click', () => fileInput.click());

        uploadArea.addEventListener('dragover', (e) => {
            e.preventDefault();
            uploadArea.classList.add('dragover');
        });

        uploadArea.addEventListener('dragleave', () => {
            uploadArea.classList.remove('dragover');
        });

        uploadArea.addEventListener('drop', (e) => {
            e.preventDefault();
            uploadArea.classList.remove('dragover');
            const file = e.dataTransfer.files[0];
            if (file) {
                handleFile(file);
            }
        });

        fileInput.addEventListener('change', (e) => {
            const file = e.target.files[0];
            if (file) {
                handleFile(file);
            }
        });

        predictButton.addEventListener('click', async () => {
            predictButton.disabled = true;
            try {
                render(await api('POST', `/${sessionId}/submit`));
            } catch (error) {
                predictButton.disabled = false;
                showError(error.message);
            }
        });

        $('clearButton').addEventListener('click', reset);
        $('resetButton').addEventListener('click', reset);

        window.addEventListener('pagehide', () => {
            if (sessionId) {
                fetch(`/api/sessions/${sessionId}`, { method: 'DELETE', keepalive: true });
            }
        });

        api('POST', '').then((session) => {
            sessionId = session.id;
            render(session);
        }).catch((error) => showError(error.message));
    </script>
</body>
</html>
"#;
